//! Incremental UTF-8 decoding of transport chunks.

const REPLACEMENT: char = '\u{FFFD}';

/// Turns raw byte chunks into text, holding back a trailing incomplete
/// multi-byte sequence until the next chunk arrives.
///
/// Invalid sequences are replaced with U+FFFD; decoding never fails.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    carry: Vec<u8>,
}

impl ChunkDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the next chunk and returns every fully decoded character.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        if chunk.is_empty() {
            return String::new();
        }
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    // valid_up_to guarantees this prefix is UTF-8
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(REPLACEMENT);
                            rest = &after[bad..];
                        }
                        None => {
                            // incomplete sequence at the end of input
                            self.carry.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes held-over bytes at stream end.
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            return String::new();
        }
        let carry = std::mem::take(&mut self.carry);
        String::from_utf8_lossy(&carry).into_owned()
    }

    /// Returns true while a partial sequence is held over.
    pub fn has_pending(&self) -> bool {
        !self.carry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_multibyte_char_decodes_like_whole() {
        let text = "olá 世界";
        let bytes = text.as_bytes();
        // split inside the 3-byte '世'
        let cut = text.find('世').expect("char") + 1;
        let mut decoder = ChunkDecoder::new();
        let mut out = decoder.decode(&bytes[..cut]);
        assert!(decoder.has_pending());
        out.push_str(&decoder.decode(&bytes[cut..]));
        out.push_str(&decoder.finish());
        assert_eq!(out, text);
    }

    #[test]
    fn byte_at_a_time_reconstructs_text() {
        let text = "data: {\"response\":\"ção 🎉\"}\n\n";
        let mut decoder = ChunkDecoder::new();
        let mut out = String::new();
        for byte in text.as_bytes() {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(out, text);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn invalid_bytes_are_replaced_and_decoding_continues() {
        let mut decoder = ChunkDecoder::new();
        let out = decoder.decode(b"ok\xFFstill ok");
        assert_eq!(out, "ok\u{FFFD}still ok");
    }

    #[test]
    fn truncated_sequence_is_flushed_lossy() {
        let mut decoder = ChunkDecoder::new();
        assert_eq!(decoder.decode(&[b'a', 0xE4, 0xB8]), "a");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn empty_chunk_yields_nothing() {
        let mut decoder = ChunkDecoder::new();
        assert_eq!(decoder.decode(&[]), "");
    }
}
