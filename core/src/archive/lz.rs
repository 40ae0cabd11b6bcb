//! BOLT-LZ codec.
//!
//! Each control byte splits into `mode = c >> 6`, `flag = c & 0x20` and
//! `num = c & 0x1F`:
//!
//! | mode | flag | action |
//! |------|------|--------|
//! | 0 | - | copy `31 - num` literal bytes |
//! | 1 | high bit of offset | copy `35 - num` bytes from `out[-(byte + 256*flag)]` |
//! | 2 | +2 bytes | copy `(32 - num) * 4 + 2*flag` bytes from `out[-(byte * 2)]` |
//! | 3 | set | no-op |
//! | 3 | clear | fill `(32 - num + 32 * byte) * 4` bytes; one ignored byte, then the fill byte |
//!
//! The stream has no terminator; decoding stops once the output is full and
//! every count is clipped to the space that remains.

use crate::error::DecompressError;

struct Input<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Input<'_> {
    #[inline]
    fn byte(&mut self, output: usize, size: usize) -> Result<u8, DecompressError> {
        let b = *self.bytes.get(self.pos).ok_or(DecompressError::InputExhausted {
            input: self.pos,
            output,
            size,
        })?;
        self.pos += 1;
        Ok(b)
    }
}

/// Most output a single input byte can yield: a maximal fill spends four bytes.
const MAX_EXPANSION: usize = MAX_FILL_BLOCKS;

/// Decode `input` into exactly `out_size` bytes.
///
/// A size `input` could never fill fails before the buffer is allocated.
pub fn decompress(input: &[u8], out_size: usize) -> Result<Vec<u8>, DecompressError> {
    if out_size > input.len().saturating_mul(MAX_EXPANSION) {
        return Err(DecompressError::InputExhausted {
            input: input.len(),
            output: 0,
            size: out_size,
        });
    }
    let mut out = vec![0u8; out_size];
    decompress_into(input, &mut out)?;
    Ok(out)
}

/// Decode into a caller-sized buffer; returns the number of input bytes consumed.
pub fn decompress_into(input: &[u8], out: &mut [u8]) -> Result<usize, DecompressError> {
    let size = out.len();
    let mut src = Input { bytes: input, pos: 0 };
    let mut dst = 0usize;

    while dst < size {
        let control = src.byte(dst, size)?;
        let flag = control & 0x20 != 0;
        let num = (control & 0x1F) as usize;
        let remaining = size - dst;

        match control >> 6 {
            0 => {
                let count = (31 - num).min(remaining);
                let end = src.pos + count;
                let literal = input
                    .get(src.pos..end)
                    .ok_or(DecompressError::InputExhausted {
                        input: input.len(),
                        output: dst,
                        size,
                    })?;
                out[dst..dst + count].copy_from_slice(literal);
                src.pos = end;
                dst += count;
            }
            1 => {
                let count = (35 - num).min(remaining);
                let distance = src.byte(dst, size)? as usize + if flag { 256 } else { 0 };
                copy_back(out, dst, distance, count)?;
                dst += count;
            }
            2 => {
                let count = ((32 - num) * 4 + if flag { 2 } else { 0 }).min(remaining);
                let distance = src.byte(dst, size)? as usize * 2;
                copy_back(out, dst, distance, count)?;
                dst += count;
            }
            _ if flag => {}
            _ => {
                let blocks = 32 - num + 32 * src.byte(dst, size)? as usize;
                let _ = src.byte(dst, size)?;
                let fill = src.byte(dst, size)?;
                let count = (blocks * 4).min(remaining);
                out[dst..dst + count].fill(fill);
                dst += count;
            }
        }
    }

    Ok(src.pos)
}

// Byte at a time so overlapping runs replicate.
#[inline]
fn copy_back(out: &mut [u8], dst: usize, distance: usize, count: usize) -> Result<(), DecompressError> {
    if distance == 0 || distance > dst {
        return Err(DecompressError::BadBackReference { distance, output: dst });
    }
    for i in dst..dst + count {
        out[i] = out[i - distance];
    }
    Ok(())
}

const MAX_LITERAL: usize = 31;
const MIN_MATCH: usize = 4;
const MAX_SHORT_MATCH: usize = 35;
const MAX_SHORT_DISTANCE: usize = 511;
const MAX_LONG_MATCH: usize = 130;
const MAX_LONG_DISTANCE: usize = 510;
const MIN_FILL: usize = 8;
const MAX_FILL_BLOCKS: usize = 32 + 32 * 255;

#[derive(Clone, Copy)]
enum Token {
    Short { distance: usize, len: usize },
    Long { distance: usize, len: usize },
}

impl Token {
    fn len(self) -> usize {
        match self {
            Token::Short { len, .. } | Token::Long { len, .. } => len,
        }
    }
}

/// Reference encoder. Greedy; favours fills, then the longest back-reference.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2 + 8);
    let mut literal_start = 0usize;
    let mut i = 0usize;

    while i < data.len() {
        let run = data[i..].iter().take_while(|&&b| b == data[i]).count();
        if run >= MIN_FILL {
            flush_literals(&mut out, &data[literal_start..i]);
            let blocks = (run / 4).min(MAX_FILL_BLOCKS);
            let hi = (blocks - 1) / 32;
            let num = 32 - (blocks - 32 * hi);
            out.extend_from_slice(&[0xC0 | num as u8, hi as u8, 0, data[i]]);
            i += blocks * 4;
            literal_start = i;
            continue;
        }

        if let Some(token) = best_match(data, i) {
            flush_literals(&mut out, &data[literal_start..i]);
            match token {
                Token::Short { distance, len } => {
                    let flag = if distance >= 256 { 0x20 } else { 0 };
                    out.push(0x40 | flag | (MAX_SHORT_MATCH - len) as u8);
                    out.push(distance as u8);
                }
                Token::Long { distance, len } => {
                    let (num, flag) = if len % 4 == 0 {
                        (32 - len / 4, 0)
                    } else {
                        (32 - (len - 2) / 4, 0x20)
                    };
                    out.push(0x80 | flag | num as u8);
                    out.push((distance / 2) as u8);
                }
            }
            i += token.len();
            literal_start = i;
            continue;
        }

        i += 1;
    }

    flush_literals(&mut out, &data[literal_start..]);
    out
}

fn flush_literals(out: &mut Vec<u8>, mut literals: &[u8]) {
    while !literals.is_empty() {
        let n = literals.len().min(MAX_LITERAL);
        out.push((MAX_LITERAL - n) as u8);
        out.extend_from_slice(&literals[..n]);
        literals = &literals[n..];
    }
}

fn best_match(data: &[u8], at: usize) -> Option<Token> {
    let limit = data.len() - at;
    let mut best: Option<Token> = None;

    for distance in 1..=at.min(MAX_SHORT_DISTANCE) {
        let cap = limit.min(MAX_LONG_MATCH);
        let matched = (0..cap)
            .take_while(|&k| data[at + k] == data[at + k - distance])
            .count();

        let short = matched.min(MAX_SHORT_MATCH);
        if short >= MIN_MATCH && best.is_none_or(|t| short > t.len()) {
            best = Some(Token::Short { distance, len: short });
        }

        if distance % 2 == 0 && distance <= MAX_LONG_DISTANCE {
            let long = matched & !1;
            if long >= MIN_MATCH && best.is_none_or(|t| long > t.len()) {
                best = Some(Token::Long { distance, len: long });
            }
        }
    }

    best
}
