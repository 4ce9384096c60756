//! Splits decoded text into delimiter-bounded frames.

/// Frame boundary used by a protocol variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    /// Server-sent-event style blank line (`\n\n`, or `\r\n\r\n`).
    #[default]
    BlankLine,
    /// One frame per line (`\n`, a trailing `\r` is dropped).
    Newline,
}

/// One complete protocol unit, delimiter excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub text: String,
}

impl Frame {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Accumulates decoded text and yields complete frames in arrival order.
///
/// After `push` returns, the buffer holds at most one incomplete frame.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    delimiter: Delimiter,
    buf: String,
}

impl FrameReassembler {
    pub fn new(delimiter: Delimiter) -> Self {
        Self {
            delimiter,
            buf: String::new(),
        }
    }

    /// Appends `text` and returns every frame it completed.
    pub fn push(&mut self, text: &str) -> Vec<Frame> {
        if text.is_empty() {
            return Vec::new();
        }
        self.buf.push_str(text);
        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some((idx, delim_len)) = self.find_delimiter(consumed) {
            frames.push(self.frame_at(consumed, idx));
            consumed = idx + delim_len;
        }
        if consumed > 0 {
            self.buf.drain(..consumed);
        }
        frames
    }

    /// Ends the stream, returning any non-blank remainder as a final frame.
    pub fn close(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.buf);
        if rest.trim().is_empty() {
            return None;
        }
        Some(Frame::new(rest))
    }

    /// Text buffered after the last delimiter.
    pub fn pending(&self) -> &str {
        &self.buf
    }

    fn frame_at(&self, start: usize, end: usize) -> Frame {
        let text = &self.buf[start..end];
        match self.delimiter {
            Delimiter::BlankLine => Frame::new(text),
            Delimiter::Newline => Frame::new(text.strip_suffix('\r').unwrap_or(text)),
        }
    }

    /// Finds the first delimiter at or after `from`, returning its byte
    /// offset and length.
    fn find_delimiter(&self, from: usize) -> Option<(usize, usize)> {
        let bytes = self.buf.as_bytes();
        match self.delimiter {
            Delimiter::Newline => bytes[from..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|pos| (from + pos, 1)),
            Delimiter::BlankLine => {
                let mut i = from;
                while i + 1 < bytes.len() {
                    if bytes[i] == b'\n' && bytes[i + 1] == b'\n' {
                        return Some((i, 2));
                    }
                    if i + 3 < bytes.len() && &bytes[i..i + 4] == b"\r\n\r\n" {
                        return Some((i, 4));
                    }
                    i += 1;
                }
                None
            }
        }
    }
}
