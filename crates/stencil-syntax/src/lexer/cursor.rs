/// Character cursor over template source with byte-offset tracking.
pub struct Cursor<'src> {
    source: &'src str,
    pos: u32,
}

impl<'src> Cursor<'src> {
    pub fn new(source: &'src str) -> Self {
        Self { source, pos: 0 }
    }

    /// The unconsumed remainder of the source.
    pub fn rest(&self) -> &'src str {
        &self.source[self.pos as usize..]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_next(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    /// Consume one character, returning it.
    pub fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8() as u32;
        Some(c)
    }

    /// Consume `n` bytes. Callers only use this after matching an ASCII prefix.
    pub fn advance_bytes(&mut self, n: u32) {
        self.pos = (self.pos + n).min(self.source.len() as u32);
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos as usize >= self.source.len()
    }

    pub fn eat_while(&mut self, predicate: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            self.advance();
        }
    }

    /// Slice of the source between two byte offsets.
    pub fn slice(&self, start: u32, end: u32) -> &'src str {
        &self.source[start as usize..end as usize]
    }

    /// Jump to the byte offset of the next occurrence of `needle`, or to EOF.
    /// Returns whether the needle was found.
    pub fn skip_to(&mut self, needle: &str) -> bool {
        match self.rest().find(needle) {
            Some(offset) => {
                self.pos += offset as u32;
                true
            }
            None => {
                self.pos = self.source.len() as u32;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_byte_offsets() {
        let mut cursor = Cursor::new("é{{");
        assert_eq!(cursor.advance(), Some('é'));
        assert_eq!(cursor.pos(), 2);
        assert!(cursor.starts_with("{{"));
    }

    #[test]
    fn skip_to_stops_at_needle_or_eof() {
        let mut cursor = Cursor::new("abc{{x");
        assert!(cursor.skip_to("{{"));
        assert_eq!(cursor.pos(), 3);
        assert!(!cursor.skip_to("}}"));
        assert!(cursor.is_eof());
    }
}
