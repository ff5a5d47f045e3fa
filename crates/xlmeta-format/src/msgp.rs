//! MessagePack primitives
//!
//! Metadata records nest MessagePack values inside a little-endian outer
//! header. Only the subset the record layouts use is exposed here:
//! length-prefixed byte strings, strings, integers, array/map headers and a
//! structural `skip` for self-describing objects.
//!
//! [`Reader`] is a zero-copy cursor over a borrowed buffer. Every read is
//! bounds-checked against the remaining bytes and leaves the cursor where it
//! was when it fails, so a caller can attempt an optional field and carry on
//! from the same position.
//!
//! MessagePack integers and lengths are big-endian on the wire.

use bytes::BufMut;
use thiserror::Error;

/// Wire markers
pub mod marker {
    pub const NIL: u8 = 0xc0;
    pub const FALSE: u8 = 0xc2;
    pub const TRUE: u8 = 0xc3;
    pub const BIN8: u8 = 0xc4;
    pub const BIN16: u8 = 0xc5;
    pub const BIN32: u8 = 0xc6;
    pub const EXT8: u8 = 0xc7;
    pub const EXT16: u8 = 0xc8;
    pub const EXT32: u8 = 0xc9;
    pub const FLOAT32: u8 = 0xca;
    pub const FLOAT64: u8 = 0xcb;
    pub const UINT8: u8 = 0xcc;
    pub const UINT16: u8 = 0xcd;
    pub const UINT32: u8 = 0xce;
    pub const UINT64: u8 = 0xcf;
    pub const INT8: u8 = 0xd0;
    pub const INT16: u8 = 0xd1;
    pub const INT32: u8 = 0xd2;
    pub const INT64: u8 = 0xd3;
    pub const FIXEXT1: u8 = 0xd4;
    pub const FIXEXT2: u8 = 0xd5;
    pub const FIXEXT4: u8 = 0xd6;
    pub const FIXEXT8: u8 = 0xd7;
    pub const FIXEXT16: u8 = 0xd8;
    pub const STR8: u8 = 0xd9;
    pub const STR16: u8 = 0xda;
    pub const STR32: u8 = 0xdb;
    pub const ARRAY16: u8 = 0xdc;
    pub const ARRAY32: u8 = 0xdd;
    pub const MAP16: u8 = 0xde;
    pub const MAP32: u8 = 0xdf;

    pub const FIXMAP: u8 = 0x80;
    pub const FIXARRAY: u8 = 0x90;
    pub const FIXSTR: u8 = 0xa0;
}

use marker::*;

/// Errors from primitive MessagePack reads
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MsgpError {
    #[error("short read: need {want} bytes, {have} remaining")]
    ShortBytes { want: usize, have: usize },

    #[error("expected {expected}, found marker {found:#04x}")]
    TypeMismatch { expected: &'static str, found: u8 },

    #[error("integer out of range for {0}")]
    IntOverflow(&'static str),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("expected {want} bytes, found {got}")]
    LengthMismatch { want: usize, got: usize },

    #[error("nesting deeper than {0} levels")]
    DepthExceeded(usize),
}

type Result<T> = std::result::Result<T, MsgpError>;

fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if buf.len() < n {
        return Err(MsgpError::ShortBytes {
            want: n,
            have: buf.len(),
        });
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

fn take_u8(buf: &mut &[u8]) -> Result<u8> {
    Ok(take(buf, 1)?[0])
}

fn take_array<const N: usize>(buf: &mut &[u8]) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(take(buf, N)?);
    Ok(out)
}

fn take_u16(buf: &mut &[u8]) -> Result<u16> {
    Ok(u16::from_be_bytes(take_array(buf)?))
}

fn take_u32(buf: &mut &[u8]) -> Result<u32> {
    Ok(u32::from_be_bytes(take_array(buf)?))
}

fn take_len32(buf: &mut &[u8]) -> Result<usize> {
    usize::try_from(take_u32(buf)?).map_err(|_| MsgpError::IntOverflow("usize"))
}

/// Zero-copy MessagePack cursor
#[derive(Clone, Copy, Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    /// Create a reader over `buf`
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not consumed yet
    #[must_use]
    pub const fn remaining(&self) -> &'a [u8] {
        self.buf
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Next marker byte, without consuming it
    pub fn peek(&self) -> Result<u8> {
        self.buf.first().copied().ok_or(MsgpError::ShortBytes { want: 1, have: 0 })
    }

    /// Read a length-prefixed byte string (bin 8/16/32)
    pub fn read_bin(&mut self) -> Result<&'a [u8]> {
        let mut buf = self.buf;
        let m = take_u8(&mut buf)?;
        let len = match m {
            BIN8 => usize::from(take_u8(&mut buf)?),
            BIN16 => usize::from(take_u16(&mut buf)?),
            BIN32 => take_len32(&mut buf)?,
            _ => {
                return Err(MsgpError::TypeMismatch {
                    expected: "bin",
                    found: m,
                });
            }
        };
        let data = take(&mut buf, len)?;
        self.buf = buf;
        Ok(data)
    }

    /// Read a byte string that must be exactly `N` bytes long
    pub fn read_bin_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut probe = *self;
        let data = probe.read_bin()?;
        if data.len() != N {
            return Err(MsgpError::LengthMismatch {
                want: N,
                got: data.len(),
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(data);
        *self = probe;
        Ok(out)
    }

    fn read_str_bytes(&mut self) -> Result<&'a [u8]> {
        let mut buf = self.buf;
        let m = take_u8(&mut buf)?;
        let len = match m {
            0xa0..=0xbf => usize::from(m & 0x1f),
            STR8 => usize::from(take_u8(&mut buf)?),
            STR16 => usize::from(take_u16(&mut buf)?),
            STR32 => take_len32(&mut buf)?,
            _ => {
                return Err(MsgpError::TypeMismatch {
                    expected: "str",
                    found: m,
                });
            }
        };
        let data = take(&mut buf, len)?;
        self.buf = buf;
        Ok(data)
    }

    /// Read a UTF-8 string
    pub fn read_str(&mut self) -> Result<&'a str> {
        let mut probe = *self;
        let raw = probe.read_str_bytes()?;
        let s = std::str::from_utf8(raw).map_err(|_| MsgpError::InvalidUtf8)?;
        *self = probe;
        Ok(s)
    }

    /// Read a map key, which writers may encode as either str or bin
    pub fn read_map_key(&mut self) -> Result<&'a [u8]> {
        match self.peek()? {
            BIN8 | BIN16 | BIN32 => self.read_bin(),
            _ => self.read_str_bytes(),
        }
    }

    /// Read a non-negative integer of any width
    pub fn read_uint(&mut self) -> Result<u64> {
        let mut buf = self.buf;
        let m = take_u8(&mut buf)?;
        let v = match m {
            0x00..=0x7f => u64::from(m),
            UINT8 => u64::from(take_u8(&mut buf)?),
            UINT16 => u64::from(take_u16(&mut buf)?),
            UINT32 => u64::from(take_u32(&mut buf)?),
            UINT64 => u64::from_be_bytes(take_array(&mut buf)?),
            INT8 | INT16 | INT32 | INT64 | 0xe0..=0xff => {
                let mut signed = *self;
                let v = signed.read_int()?;
                buf = signed.buf;
                u64::try_from(v).map_err(|_| MsgpError::IntOverflow("u64"))?
            }
            _ => {
                return Err(MsgpError::TypeMismatch {
                    expected: "uint",
                    found: m,
                });
            }
        };
        self.buf = buf;
        Ok(v)
    }

    /// Read a signed integer of any width
    pub fn read_int(&mut self) -> Result<i64> {
        let mut buf = self.buf;
        let m = take_u8(&mut buf)?;
        let v = match m {
            0x00..=0x7f => i64::from(m),
            0xe0..=0xff => i64::from(i8::from_be_bytes([m])),
            INT8 => i64::from(i8::from_be_bytes(take_array(&mut buf)?)),
            INT16 => i64::from(i16::from_be_bytes(take_array(&mut buf)?)),
            INT32 => i64::from(i32::from_be_bytes(take_array(&mut buf)?)),
            INT64 => i64::from_be_bytes(take_array(&mut buf)?),
            UINT8 => i64::from(take_u8(&mut buf)?),
            UINT16 => i64::from(take_u16(&mut buf)?),
            UINT32 => i64::from(take_u32(&mut buf)?),
            UINT64 => i64::try_from(u64::from_be_bytes(take_array(&mut buf)?))
                .map_err(|_| MsgpError::IntOverflow("i64"))?,
            _ => {
                return Err(MsgpError::TypeMismatch {
                    expected: "int",
                    found: m,
                });
            }
        };
        self.buf = buf;
        Ok(v)
    }

    /// Read an unsigned integer that must fit in 32 bits
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut probe = *self;
        let v = u32::try_from(probe.read_uint()?).map_err(|_| MsgpError::IntOverflow("u32"))?;
        *self = probe;
        Ok(v)
    }

    /// Read an unsigned integer that must fit in 8 bits
    pub fn read_u8(&mut self) -> Result<u8> {
        let mut probe = *self;
        let v = u8::try_from(probe.read_uint()?).map_err(|_| MsgpError::IntOverflow("u8"))?;
        *self = probe;
        Ok(v)
    }

    /// Attempt an optional trailing `u32`
    ///
    /// Returns `None` and leaves the cursor untouched when the next value is
    /// missing or is not a 32-bit unsigned integer.
    pub fn try_read_u32(&mut self) -> Option<u32> {
        self.read_u32().ok()
    }

    /// Read an array header, returning the element count
    pub fn read_array_len(&mut self) -> Result<u32> {
        let mut buf = self.buf;
        let m = take_u8(&mut buf)?;
        let n = match m {
            0x90..=0x9f => u32::from(m & 0x0f),
            ARRAY16 => u32::from(take_u16(&mut buf)?),
            ARRAY32 => take_u32(&mut buf)?,
            _ => {
                return Err(MsgpError::TypeMismatch {
                    expected: "array",
                    found: m,
                });
            }
        };
        self.buf = buf;
        Ok(n)
    }

    /// Read a map header, returning the number of key/value pairs
    pub fn read_map_len(&mut self) -> Result<u32> {
        let mut buf = self.buf;
        let m = take_u8(&mut buf)?;
        let n = match m {
            0x80..=0x8f => u32::from(m & 0x0f),
            MAP16 => u32::from(take_u16(&mut buf)?),
            MAP32 => take_u32(&mut buf)?,
            _ => {
                return Err(MsgpError::TypeMismatch {
                    expected: "map",
                    found: m,
                });
            }
        };
        self.buf = buf;
        Ok(n)
    }

    /// Read a nil marker
    pub fn read_nil(&mut self) -> Result<()> {
        let mut buf = self.buf;
        let m = take_u8(&mut buf)?;
        if m != NIL {
            return Err(MsgpError::TypeMismatch {
                expected: "nil",
                found: m,
            });
        }
        self.buf = buf;
        Ok(())
    }

    /// Read a boolean
    pub fn read_bool(&mut self) -> Result<bool> {
        let mut buf = self.buf;
        let v = match take_u8(&mut buf)? {
            TRUE => true,
            FALSE => false,
            m => {
                return Err(MsgpError::TypeMismatch {
                    expected: "bool",
                    found: m,
                });
            }
        };
        self.buf = buf;
        Ok(v)
    }

    /// Read a float32 or float64
    pub fn read_f64(&mut self) -> Result<f64> {
        let mut buf = self.buf;
        let v = match take_u8(&mut buf)? {
            FLOAT32 => f64::from(f32::from_be_bytes(take_array(&mut buf)?)),
            FLOAT64 => f64::from_be_bytes(take_array(&mut buf)?),
            m => {
                return Err(MsgpError::TypeMismatch {
                    expected: "float",
                    found: m,
                });
            }
        };
        self.buf = buf;
        Ok(v)
    }

    /// Read an extension value, returning its type tag and data
    pub fn read_ext(&mut self) -> Result<(i8, &'a [u8])> {
        let mut buf = self.buf;
        let m = take_u8(&mut buf)?;
        let len = match m {
            FIXEXT1 => 1,
            FIXEXT2 => 2,
            FIXEXT4 => 4,
            FIXEXT8 => 8,
            FIXEXT16 => 16,
            EXT8 => usize::from(take_u8(&mut buf)?),
            EXT16 => usize::from(take_u16(&mut buf)?),
            EXT32 => take_len32(&mut buf)?,
            _ => {
                return Err(MsgpError::TypeMismatch {
                    expected: "ext",
                    found: m,
                });
            }
        };
        let tag = i8::from_be_bytes([take_u8(&mut buf)?]);
        let data = take(&mut buf, len)?;
        self.buf = buf;
        Ok((tag, data))
    }

    /// Skip exactly one complete object, including everything nested in it
    ///
    /// Iterative: nesting depth does not grow the stack.
    pub fn skip(&mut self) -> Result<()> {
        let mut buf = self.buf;
        let mut pending: u64 = 1;
        while pending > 0 {
            // Every pending object needs at least its marker byte.
            if pending > buf.len() as u64 {
                return Err(MsgpError::ShortBytes {
                    want: usize::try_from(pending).unwrap_or(usize::MAX),
                    have: buf.len(),
                });
            }
            pending -= 1;
            let m = take_u8(&mut buf)?;
            let body = match m {
                0x00..=0x7f | 0xe0..=0xff | NIL | FALSE | TRUE => 0,
                0x80..=0x8f => {
                    pending += 2 * u64::from(m & 0x0f);
                    0
                }
                0x90..=0x9f => {
                    pending += u64::from(m & 0x0f);
                    0
                }
                0xa0..=0xbf => usize::from(m & 0x1f),
                BIN8 | STR8 => usize::from(take_u8(&mut buf)?),
                BIN16 | STR16 => usize::from(take_u16(&mut buf)?),
                BIN32 | STR32 => take_len32(&mut buf)?,
                EXT8 => usize::from(take_u8(&mut buf)?) + 1,
                EXT16 => usize::from(take_u16(&mut buf)?) + 1,
                EXT32 => take_len32(&mut buf)?.saturating_add(1),
                UINT8 | INT8 => 1,
                UINT16 | INT16 => 2,
                UINT32 | INT32 | FLOAT32 => 4,
                UINT64 | INT64 | FLOAT64 => 8,
                FIXEXT1 => 2,
                FIXEXT2 => 3,
                FIXEXT4 => 5,
                FIXEXT8 => 9,
                FIXEXT16 => 17,
                ARRAY16 => {
                    pending += u64::from(take_u16(&mut buf)?);
                    0
                }
                ARRAY32 => {
                    pending += u64::from(take_u32(&mut buf)?);
                    0
                }
                MAP16 => {
                    pending += 2 * u64::from(take_u16(&mut buf)?);
                    0
                }
                MAP32 => {
                    pending += 2 * u64::from(take_u32(&mut buf)?);
                    0
                }
                _ => {
                    return Err(MsgpError::TypeMismatch {
                        expected: "object",
                        found: m,
                    });
                }
            };
            take(&mut buf, body)?;
        }
        self.buf = buf;
        Ok(())
    }

    /// Skip one object and return the bytes it occupied
    pub fn read_raw(&mut self) -> Result<&'a [u8]> {
        let start = self.buf;
        self.skip()?;
        Ok(&start[..start.len() - self.buf.len()])
    }
}

// Writers. Lengths above u32::MAX cannot be represented by MessagePack.

/// Append a byte string using the smallest bin encoding
///
/// # Panics
///
/// Panics if `data` is longer than `u32::MAX` bytes.
pub fn write_bin(dst: &mut impl BufMut, data: &[u8]) {
    write_len(dst, data.len(), [BIN8, BIN16, BIN32]);
    dst.put_slice(data);
}

/// Append a string using the smallest str encoding
///
/// # Panics
///
/// Panics if `s` is longer than `u32::MAX` bytes.
#[allow(clippy::cast_possible_truncation)]
pub fn write_str(dst: &mut impl BufMut, s: &str) {
    if s.len() < 32 {
        dst.put_u8(FIXSTR | s.len() as u8);
    } else {
        write_len(dst, s.len(), [STR8, STR16, STR32]);
    }
    dst.put_slice(s.as_bytes());
}

#[allow(clippy::cast_possible_truncation)]
fn write_len(dst: &mut impl BufMut, len: usize, markers: [u8; 3]) {
    assert!(
        u32::try_from(len).is_ok(),
        "length {len} exceeds the MessagePack limit"
    );
    if len <= usize::from(u8::MAX) {
        dst.put_u8(markers[0]);
        dst.put_u8(len as u8);
    } else if len <= usize::from(u16::MAX) {
        dst.put_u8(markers[1]);
        dst.put_u16(len as u16);
    } else {
        dst.put_u8(markers[2]);
        dst.put_u32(len as u32);
    }
}

/// Append an unsigned integer using the smallest encoding
#[allow(clippy::cast_possible_truncation)]
pub fn write_uint(dst: &mut impl BufMut, v: u64) {
    if v <= 0x7f {
        dst.put_u8(v as u8);
    } else if v <= u64::from(u8::MAX) {
        dst.put_u8(UINT8);
        dst.put_u8(v as u8);
    } else if v <= u64::from(u16::MAX) {
        dst.put_u8(UINT16);
        dst.put_u16(v as u16);
    } else if v <= u64::from(u32::MAX) {
        dst.put_u8(UINT32);
        dst.put_u32(v as u32);
    } else {
        dst.put_u8(UINT64);
        dst.put_u64(v);
    }
}

/// Append a signed integer using the smallest encoding
#[allow(clippy::cast_possible_truncation)]
pub fn write_int(dst: &mut impl BufMut, v: i64) {
    if v >= 0 {
        if v <= 0x7f {
            dst.put_u8(v as u8);
        } else if v <= i64::from(i16::MAX) {
            dst.put_u8(INT16);
            dst.put_i16(v as i16);
        } else if v <= i64::from(i32::MAX) {
            dst.put_u8(INT32);
            dst.put_i32(v as i32);
        } else {
            dst.put_u8(INT64);
            dst.put_i64(v);
        }
    } else if v >= -32 {
        dst.put_i8(v as i8);
    } else if v >= i64::from(i8::MIN) {
        dst.put_u8(INT8);
        dst.put_i8(v as i8);
    } else if v >= i64::from(i16::MIN) {
        dst.put_u8(INT16);
        dst.put_i16(v as i16);
    } else if v >= i64::from(i32::MIN) {
        dst.put_u8(INT32);
        dst.put_i32(v as i32);
    } else {
        dst.put_u8(INT64);
        dst.put_i64(v);
    }
}

/// Append an array header
#[allow(clippy::cast_possible_truncation)]
pub fn write_array_len(dst: &mut impl BufMut, n: u32) {
    if n < 16 {
        dst.put_u8(FIXARRAY | n as u8);
    } else if n <= u32::from(u16::MAX) {
        dst.put_u8(ARRAY16);
        dst.put_u16(n as u16);
    } else {
        dst.put_u8(ARRAY32);
        dst.put_u32(n);
    }
}

/// Append a map header
#[allow(clippy::cast_possible_truncation)]
pub fn write_map_len(dst: &mut impl BufMut, n: u32) {
    if n < 16 {
        dst.put_u8(FIXMAP | n as u8);
    } else if n <= u32::from(u16::MAX) {
        dst.put_u8(MAP16);
        dst.put_u16(n as u16);
    } else {
        dst.put_u8(MAP32);
        dst.put_u32(n);
    }
}

pub fn write_nil(dst: &mut impl BufMut) {
    dst.put_u8(NIL);
}

pub fn write_bool(dst: &mut impl BufMut, v: bool) {
    dst.put_u8(if v { TRUE } else { FALSE });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_encodings() {
        for len in [0usize, 1, 255, 256, 65535, 65536] {
            let data = vec![0xabu8; len];
            let mut buf = Vec::new();
            write_bin(&mut buf, &data);

            let mut r = Reader::new(&buf);
            assert_eq!(r.read_bin().unwrap(), &data[..]);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn test_bin_marker_widths() {
        let mut buf = Vec::new();
        write_bin(&mut buf, &[1, 2, 3]);
        assert_eq!(buf, vec![BIN8, 3, 1, 2, 3]);

        let mut buf = Vec::new();
        write_bin(&mut buf, &[0u8; 300]);
        assert_eq!(&buf[..3], &[BIN16, 0x01, 0x2c]);
    }

    #[test]
    fn test_bin_short_read_does_not_advance() {
        // Declares 10 bytes but carries 3.
        let buf = [BIN8, 10, 1, 2, 3];
        let mut r = Reader::new(&buf);
        assert_eq!(
            r.read_bin(),
            Err(MsgpError::ShortBytes { want: 10, have: 3 })
        );
        assert_eq!(r.len(), buf.len());
    }

    #[test]
    fn test_bin_type_mismatch() {
        let mut buf = Vec::new();
        write_str(&mut buf, "abc");
        let mut r = Reader::new(&buf);
        assert!(matches!(
            r.read_bin(),
            Err(MsgpError::TypeMismatch { expected: "bin", .. })
        ));
    }

    #[test]
    fn test_bin_array_length_mismatch() {
        let mut buf = Vec::new();
        write_bin(&mut buf, &[0u8; 15]);
        let mut r = Reader::new(&buf);
        assert_eq!(
            r.read_bin_array::<16>(),
            Err(MsgpError::LengthMismatch { want: 16, got: 15 })
        );
        assert_eq!(r.len(), buf.len());
    }

    #[test]
    fn test_uint_widths() {
        for v in [0u64, 1, 127, 128, 255, 256, 65535, 65536, u64::from(u32::MAX), u64::MAX] {
            let mut buf = Vec::new();
            write_uint(&mut buf, v);
            let mut r = Reader::new(&buf);
            assert_eq!(r.read_uint().unwrap(), v);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn test_int_widths() {
        for v in [
            0i64,
            1,
            -1,
            -32,
            -33,
            127,
            128,
            -128,
            -129,
            i64::from(i16::MAX) + 1,
            i64::from(i32::MIN) - 1,
            i64::MIN,
            i64::MAX,
        ] {
            let mut buf = Vec::new();
            write_int(&mut buf, v);
            let mut r = Reader::new(&buf);
            assert_eq!(r.read_int().unwrap(), v, "value {v}");
            assert!(r.is_empty());
        }
    }

    #[test]
    fn test_uint_rejects_negative() {
        let mut buf = Vec::new();
        write_int(&mut buf, -5);
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_uint(), Err(MsgpError::IntOverflow("u64")));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_uint_accepts_positive_signed_encoding() {
        let buf = [INT16, 0x01, 0x00];
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_uint().unwrap(), 256);
    }

    #[test]
    fn test_u32_overflow_does_not_advance() {
        let mut buf = Vec::new();
        write_uint(&mut buf, u64::from(u32::MAX) + 1);
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_u32(), Err(MsgpError::IntOverflow("u32")));
        assert_eq!(r.len(), buf.len());
        assert_eq!(r.try_read_u32(), None);
        assert_eq!(r.len(), buf.len());
    }

    #[test]
    fn test_try_read_u32() {
        let mut buf = Vec::new();
        write_uint(&mut buf, 0xdead_beef);
        buf.push(0x42);

        let mut r = Reader::new(&buf);
        assert_eq!(r.try_read_u32(), Some(0xdead_beef));
        assert_eq!(r.remaining(), &[0x42]);

        let mut r = Reader::new(&[]);
        assert_eq!(r.try_read_u32(), None);
    }

    #[test]
    fn test_str_and_map_key() {
        let long = "k".repeat(40);
        let mut buf = Vec::new();
        write_str(&mut buf, "part.1");
        write_str(&mut buf, &long);
        write_bin(&mut buf, b"raw");

        let mut r = Reader::new(&buf);
        assert_eq!(r.read_str().unwrap(), "part.1");
        assert_eq!(r.read_map_key().unwrap(), long.as_bytes());
        assert_eq!(r.read_map_key().unwrap(), b"raw");
        assert!(r.is_empty());
    }

    #[test]
    fn test_str_invalid_utf8() {
        let buf = [FIXSTR | 2, 0xff, 0xfe];
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_str(), Err(MsgpError::InvalidUtf8));
        assert_eq!(r.len(), 3);
    }

    #[test]
    fn test_array_and_map_headers() {
        for n in [0u32, 5, 15, 16, 65535, 65536] {
            let mut buf = Vec::new();
            write_array_len(&mut buf, n);
            write_map_len(&mut buf, n);
            let mut r = Reader::new(&buf);
            assert_eq!(r.read_array_len().unwrap(), n);
            assert_eq!(r.read_map_len().unwrap(), n);
        }
    }

    #[test]
    fn test_skip_nested_object() {
        let mut buf = Vec::new();
        write_map_len(&mut buf, 2);
        write_str(&mut buf, "a");
        write_array_len(&mut buf, 3);
        write_uint(&mut buf, 1);
        write_nil(&mut buf);
        write_bin(&mut buf, &[9u8; 20]);
        write_str(&mut buf, "b");
        write_bool(&mut buf, true);
        let object_len = buf.len();
        buf.push(0x07);

        let mut r = Reader::new(&buf);
        let raw = r.read_raw().unwrap();
        assert_eq!(raw.len(), object_len);
        assert_eq!(r.remaining(), &[0x07]);
    }

    #[test]
    fn test_skip_truncated_object() {
        let mut buf = Vec::new();
        write_array_len(&mut buf, 3);
        write_uint(&mut buf, 1);

        let mut r = Reader::new(&buf);
        assert!(matches!(r.skip(), Err(MsgpError::ShortBytes { .. })));
        assert_eq!(r.len(), buf.len());
    }

    #[test]
    fn test_skip_huge_declared_count_fails_fast() {
        let buf = [ARRAY32, 0xff, 0xff, 0xff, 0xff, 0x01];
        let mut r = Reader::new(&buf);
        assert!(matches!(r.skip(), Err(MsgpError::ShortBytes { .. })));
    }

    #[test]
    fn test_skip_rejects_reserved_marker() {
        let mut r = Reader::new(&[0xc1]);
        assert!(matches!(
            r.skip(),
            Err(MsgpError::TypeMismatch { found: 0xc1, .. })
        ));
    }
}
