use std::fmt;

/// Index into the engine's native registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeId(pub u32);

/// One operand-stack cell: a 32-bit integer or a reference to a native code resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Native(NativeId),
}

impl Value {
    pub const ZERO: Value = Value::Int(0);

    /// The raw 32-bit view used by arithmetic; a native reference reads as its index.
    #[inline]
    pub fn as_int(self) -> i32 {
        match self {
            Value::Int(v) => v,
            Value::Native(id) => id.0 as i32,
        }
    }

    #[inline]
    pub fn truthy(self) -> bool {
        match self {
            Value::Int(v) => v != 0,
            Value::Native(_) => true,
        }
    }

    /// Low 16 bits, as used by the array-index opcodes.
    #[inline]
    pub fn low(self) -> u16 {
        self.as_int() as u16
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::ZERO
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(v as i32)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Native(id) => write!(f, "<native #{}>", id.0),
        }
    }
}
