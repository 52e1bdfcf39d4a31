//! Line framing for the server byte stream.
//!
//! Lines end at `\n`, with an optional preceding `\r`. Invalid UTF-8 is
//! replaced rather than rejected, so a stray byte never costs a line.

use crate::error::EngineError;
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Longest line accepted, terminator excluded. Large enough for IRCv3
/// message tags.
pub const MAX_LINE_LENGTH: usize = 8191;

#[derive(Debug, Default)]
pub struct LineCodec {
    /// Bytes already searched for a terminator.
    scanned: usize,
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = EngineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, EngineError> {
        let start = self.scanned.min(src.len());
        match src[start..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = start + offset;
                self.scanned = 0;
                if end > MAX_LINE_LENGTH + 1 {
                    return Err(EngineError::LineTooLong(MAX_LINE_LENGTH));
                }
                let line = src.split_to(end);
                src.advance(1);
                Ok(Some(decode_lossy(&line)))
            }
            None if src.len() > MAX_LINE_LENGTH + 1 => {
                Err(EngineError::LineTooLong(MAX_LINE_LENGTH))
            }
            None => {
                self.scanned = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, EngineError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.scanned = 0;
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split();
        Ok(Some(decode_lossy(&rest)))
    }
}

fn decode_lossy(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
