//! Line splitting for ffmpeg's diagnostic stream
//!
//! Like `LinesCodec`, but a carriage return also ends a line: ffmpeg redraws its
//! progress line with `\r` and only prints `\n` when the run ends.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Longest line kept before it is force-split
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Decodes a byte stream into non-empty, lossily UTF-8 decoded lines
#[derive(Debug, Default, Clone, Copy)]
pub struct DiagnosticLineCodec {
    /// Bytes already scanned for a delimiter
    next_index: usize,
}

impl DiagnosticLineCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self::default()
    }
}

fn to_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_string()
}

impl Decoder for DiagnosticLineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        loop {
            let delimiter = src[self.next_index..]
                .iter()
                .position(|b| *b == b'\n' || *b == b'\r')
                .map(|offset| self.next_index + offset);

            match delimiter {
                Some(index) => {
                    let chunk = src.split_to(index + 1);
                    self.next_index = 0;
                    let line = to_line(&chunk[..index]);
                    if !line.trim().is_empty() {
                        return Ok(Some(line));
                    }
                }
                None if src.len() >= MAX_LINE_LENGTH => {
                    let chunk = src.split_to(MAX_LINE_LENGTH);
                    self.next_index = 0;
                    return Ok(Some(to_line(&chunk)));
                }
                None => {
                    self.next_index = src.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        self.next_index = 0;
        if src.is_empty() {
            return Ok(None);
        }

        let chunk = src.split_to(src.len());
        let line = to_line(&chunk);
        Ok((!line.trim().is_empty()).then_some(line))
    }
}
