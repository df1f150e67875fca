// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Streaming UTF-8 decoding of raw reads.

/// Decodes chunks of bytes into text, holding back a trailing incomplete
/// multi-byte sequence until the next chunk arrives.
pub struct Utf8StreamDecoder {
    buf: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed one read and return the decodable text.
    ///
    /// Invalid bytes become U+FFFD. An incomplete sequence at the end of the
    /// chunk is kept for the next call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.buf.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.buf) {
                Ok(text) => {
                    out.push_str(text);
                    self.buf.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.buf[..valid]));

                    match e.error_len() {
                        None => {
                            self.buf.drain(..valid);
                            break;
                        }
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.buf.drain(..valid + bad);
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush whatever partial sequence is still buffered.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        tail
    }

    /// Number of bytes held back.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for Utf8StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"ping"), "ping");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_split_character_is_carried() {
        let mut decoder = Utf8StreamDecoder::new();
        let bytes = "héllo".as_bytes();
        // 'é' is two bytes starting at index 1
        assert_eq!(decoder.decode(&bytes[..2]), "h");
        assert_eq!(decoder.pending(), 1);
        assert_eq!(decoder.decode(&bytes[2..]), "éllo");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_finish_flushes_partial_sequence() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.pending(), 0);
    }
}
