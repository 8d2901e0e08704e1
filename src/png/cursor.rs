/// Forward-only reader over a chunk payload.
///
/// Every read is bounds checked; running out of bytes yields `None` rather
/// than a panic, and the caller picks the error to report.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes up to the next NUL; the NUL itself is consumed but not returned.
    /// Leaves the cursor untouched when no NUL remains.
    pub fn take_until_nul(&mut self) -> Option<&'a [u8]> {
        let rest = &self.buf[self.pos..];
        let len = rest.iter().position(|b| *b == 0)?;
        self.pos += len + 1;
        Some(&rest[..len])
    }

    pub fn take_u8(&mut self) -> Option<u8> {
        let b = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    /// Everything not yet consumed; the cursor ends up exhausted.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }
}
