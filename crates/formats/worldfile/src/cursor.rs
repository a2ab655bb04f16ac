use crate::error::{Error, Result};

/// Read cursor over a byte slice. All reads are little-endian.
#[derive(Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether we've reached the end.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Remaining bytes from current position.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Skip `n` bytes forward.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Read a slice of `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read a null-terminated string. The terminator is consumed.
    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let Some(len) = rest.iter().position(|&b| b == 0) else {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                need: rest.len() + 1,
                have: rest.len(),
            });
        };
        let bytes = self.read_bytes(len)?;
        self.pos += 1;
        Ok(latin1_decode(bytes))
    }

    /// Read a fixed-width `n`-byte string field. The string ends at the first
    /// null byte; the rest of the field is padding.
    pub fn read_fixed_string(&mut self, n: usize) -> Result<String> {
        let bytes = self.read_bytes(n)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(n);
        Ok(latin1_decode(&bytes[..end]))
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.pos + n > self.data.len() {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                need: n,
                have: self.remaining(),
            });
        }
        Ok(())
    }
}

/// Writer that builds a byte buffer. All writes are little-endian.
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write a string followed by a null terminator.
    pub fn write_cstring(&mut self, s: &str) -> Result<()> {
        let bytes = latin1_encode(s)?;
        self.buf.extend_from_slice(&bytes);
        self.buf.push(0);
        Ok(())
    }

    /// Write a string into a fixed `n`-byte field, null-padded. At most
    /// `n - 1` characters fit so the field always keeps a terminator.
    pub fn write_fixed_string(&mut self, s: &str, n: usize) -> Result<()> {
        let bytes = latin1_encode(s)?;
        if bytes.len() >= n {
            return Err(Error::StringTooLong {
                leaf: s.to_string(),
                len: bytes.len(),
                max: n.saturating_sub(1),
            });
        }
        self.buf.extend_from_slice(&bytes);
        self.buf.resize(self.buf.len() + (n - bytes.len()), 0);
        Ok(())
    }

    /// Patch a u32 at a specific position (for backpatching sizes).
    pub fn patch_u32(&mut self, pos: usize, v: u32) {
        let bytes = v.to_le_bytes();
        self.buf[pos..pos + 4].copy_from_slice(&bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

/// Strings in these formats are single-byte; map each byte to the code point
/// of the same value so arbitrary bytes survive a decode/encode cycle.
pub fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Inverse of [`latin1_decode`]. Fails on characters above U+00FF.
pub fn latin1_encode(s: &str) -> Result<Vec<u8>> {
    s.chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| Error::Parse {
                context: "string",
                message: format!("character {c:?} in {s:?} has no single-byte encoding"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_scalars() {
        let data = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80, 0x3F, 0xFF];
        let mut c = Cursor::new(&data);
        assert_eq!(c.read_i32().unwrap(), 1);
        assert_eq!(c.read_f32().unwrap(), 1.0);
        assert_eq!(c.read_u8().unwrap(), 0xFF);
        assert!(c.is_empty());
    }

    /// Short reads report the offset and how much was missing.
    #[test]
    fn eof_carries_offset() {
        let data = [0u8; 3];
        let mut c = Cursor::new(&data);
        c.skip(1).unwrap();
        match c.read_u32() {
            Err(Error::UnexpectedEof { offset, need, have }) => {
                assert_eq!((offset, need, have), (1, 4, 2));
            }
            other => panic!("expected eof, got {other:?}"),
        }
    }

    #[test]
    fn cstring_consumes_terminator() {
        let data = b"box\0scene\0";
        let mut c = Cursor::new(data);
        assert_eq!(c.read_cstring().unwrap(), "box");
        assert_eq!(c.read_cstring().unwrap(), "scene");
        assert!(c.is_empty());
    }

    #[test]
    fn unterminated_cstring_is_eof() {
        let mut c = Cursor::new(b"abc");
        assert!(matches!(c.read_cstring(), Err(Error::UnexpectedEof { .. })));
    }

    #[test]
    fn fixed_string_pads_and_trims() {
        let mut w = Writer::new();
        w.write_fixed_string("sand", 8).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes, b"sand\0\0\0\0");
        assert_eq!(Cursor::new(&bytes).read_fixed_string(8).unwrap(), "sand");
    }

    /// A fixed field must keep room for its terminator.
    #[test]
    fn fixed_string_rejects_full_width() {
        let mut w = Writer::new();
        assert!(matches!(
            w.write_fixed_string("abcd", 4),
            Err(Error::StringTooLong { max: 3, .. })
        ));
    }

    /// High bytes map to code points of the same value and back.
    #[test]
    fn latin1_preserves_bytes() {
        let raw = [b'n', 0xE9, 0xFF];
        let s = latin1_decode(&raw);
        assert_eq!(latin1_encode(&s).unwrap(), raw);
        assert!(latin1_encode("\u{263A}").is_err());
    }

    #[test]
    fn patch_overwrites_placeholder() {
        let mut w = Writer::new();
        w.write_u32(0);
        w.write_u8(7);
        w.patch_u32(0, 0xDEAD_BEEF);
        assert_eq!(w.into_bytes(), [0xEF, 0xBE, 0xAD, 0xDE, 7]);
    }
}
