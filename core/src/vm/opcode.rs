//! Opcode table.
//!
//! Operands follow the opcode byte, little-endian. Branch targets are offsets
//! into the code segment of the class whose handler is running.

macro_rules! opcodes {
    ($($name:ident = $code:literal, $mnemonic:literal, $operands:literal;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $code,)*
        }

        impl Opcode {
            pub fn from_u8(byte: u8) -> Option<Opcode> {
                match byte {
                    $($code => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }

            /// Fixed operand bytes. `Case` has a variable-length table on top of this.
            pub fn operand_len(self) -> usize {
                match self {
                    $(Opcode::$name => $operands,)*
                }
            }
        }
    };
}

opcodes! {
    Brt = 0x00, "BRT", 2;
    Brf = 0x01, "BRF", 2;
    Bra = 0x02, "BRA", 2;
    Case = 0x03, "CASE", 2;
    Push = 0x04, "PUSH", 0;
    Dup = 0x05, "DUP", 0;
    Not = 0x06, "NOT", 0;
    SetB = 0x07, "SETB", 0;
    Neg = 0x08, "NEG", 0;
    Add = 0x09, "ADD", 0;
    Sub = 0x0A, "SUB", 0;
    Mul = 0x0B, "MUL", 0;
    Div = 0x0C, "DIV", 0;
    Mod = 0x0D, "MOD", 0;
    Exp = 0x0E, "EXP", 0;
    BAnd = 0x0F, "BAND", 0;
    BOr = 0x10, "BOR", 0;
    Xor = 0x11, "XOR", 0;
    BNot = 0x12, "BNOT", 0;
    Shl = 0x13, "SHL", 0;
    Shr = 0x14, "SHR", 0;
    Lt = 0x15, "LT", 0;
    Le = 0x16, "LE", 0;
    Eq = 0x17, "EQ", 0;
    Ne = 0x18, "NE", 0;
    Ge = 0x19, "GE", 0;
    Gt = 0x1A, "GT", 0;
    Inc = 0x1B, "INC", 0;
    Dec = 0x1C, "DEC", 0;
    Shtc = 0x1D, "SHTC", 1;
    Intc = 0x1E, "INTC", 2;
    Lngc = 0x1F, "LNGC", 4;
    Rcrs = 0x20, "RCRS", 2;
    Call = 0x21, "CALL", 1;
    Send = 0x22, "SEND", 3;
    Pass = 0x23, "PASS", 1;
    Jsr = 0x24, "JSR", 2;
    Rts = 0x25, "RTS", 0;
    Aim = 0x26, "AIM", 2;
    Ais = 0x27, "AIS", 1;
    Ltba = 0x28, "LTBA", 2;
    Ltwa = 0x29, "LTWA", 2;
    Ltda = 0x2A, "LTDA", 2;
    Leta = 0x2B, "LETA", 2;
    Lab = 0x2C, "LAB", 2;
    Law = 0x2D, "LAW", 2;
    Lad = 0x2E, "LAD", 2;
    Sab = 0x2F, "SAB", 2;
    Saw = 0x30, "SAW", 2;
    Sad = 0x31, "SAD", 2;
    Laba = 0x32, "LABA", 2;
    Lawa = 0x33, "LAWA", 2;
    Lada = 0x34, "LADA", 2;
    Saba = 0x35, "SABA", 2;
    Sawa = 0x36, "SAWA", 2;
    Sada = 0x37, "SADA", 2;
    Leaa = 0x38, "LEAA", 2;
    Lsb = 0x39, "LSB", 2;
    Lsw = 0x3A, "LSW", 2;
    Lsd = 0x3B, "LSD", 2;
    Ssb = 0x3C, "SSB", 2;
    Ssw = 0x3D, "SSW", 2;
    Ssd = 0x3E, "SSD", 2;
    Lsba = 0x3F, "LSBA", 2;
    Lswa = 0x40, "LSWA", 2;
    Lsda = 0x41, "LSDA", 2;
    Ssba = 0x42, "SSBA", 2;
    Sswa = 0x43, "SSWA", 2;
    Ssda = 0x44, "SSDA", 2;
    Lesa = 0x45, "LESA", 2;
    Lxb = 0x46, "LXB", 2;
    Lxw = 0x47, "LXW", 2;
    Lxd = 0x48, "LXD", 2;
    Sxb = 0x49, "SXB", 2;
    Sxw = 0x4A, "SXW", 2;
    Sxd = 0x4B, "SXD", 2;
    Lxba = 0x4C, "LXBA", 2;
    Lxwa = 0x4D, "LXWA", 2;
    Lxda = 0x4E, "LXDA", 2;
    Sxba = 0x4F, "SXBA", 2;
    Sxwa = 0x50, "SXWA", 2;
    Sxda = 0x51, "SXDA", 2;
    Lexa = 0x52, "LEXA", 2;
    Sxas = 0x53, "SXAS", 0;
    Leca = 0x54, "LECA", 2;
    Sole = 0x55, "SOLE", 0;
    End = 0x56, "END", 0;
    Brk = 0x57, "BRK", 0;
    Arg = 0x58, "ARG", 1;
}

/// Width of a variable access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    Long,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
            Width::Long => 4,
        }
    }

    /// Dictionary tag letter: `B`, `W` or `L`.
    pub fn from_tag(tag: char) -> Option<Width> {
        match tag {
            'B' => Some(Width::Byte),
            'W' => Some(Width::Word),
            'L' => Some(Width::Long),
            _ => None,
        }
    }
}
