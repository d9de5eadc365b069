//! Line framing for the serial byte stream.
//!
//! The link delivers bytes in arbitrary chunks. Lines from the robot end in
//! `\n` or `\r\n`; outgoing commands carry no framing of their own (the
//! firmware delimits fields with `;`), so the terminator appended to them is
//! configurable.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Maximum length of a received line.
pub const MAX_LINE_LENGTH: usize = 256;

/// Terminator appended to outgoing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    /// Nothing; the phone app wrote bare commands.
    #[default]
    None,
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineTerminator {
    /// The terminator bytes.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            LineTerminator::None => b"",
            LineTerminator::Lf => b"\n",
            LineTerminator::CrLf => b"\r\n",
        }
    }
}

/// A codec for splitting received bytes into lines.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
    /// Set while discarding the rest of an overlong line.
    discarding: bool,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH * 2),
            discarding: false,
        }
    }

    /// Add received data to the buffer.
    ///
    /// If the pending partial line grows past [`MAX_LINE_LENGTH`] it is
    /// dropped, together with everything up to the next newline, and an
    /// error is returned once for it.
    pub fn push(&mut self, data: &[u8]) -> ProtocolResult<()> {
        let mut data = data;
        if self.discarding {
            match data.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.discarding = false;
                    data = &data[pos + 1..];
                }
                None => return Ok(()),
            }
        }

        self.buffer.extend_from_slice(data);

        let pending = match self.buffer.iter().rposition(|&b| b == b'\n') {
            Some(pos) => self.buffer.len() - pos - 1,
            None => self.buffer.len(),
        };
        if pending > MAX_LINE_LENGTH {
            let keep = self.buffer.len() - pending;
            self.buffer.truncate(keep);
            self.discarding = true;
            log::warn!("dropping overlong line ({} bytes)", pending);
            return Err(ProtocolError::LineTooLong {
                max: MAX_LINE_LENGTH,
                actual: pending,
            });
        }
        Ok(())
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// Returns the line without its `\n` or `\r\n` ending, or `None` if more
    /// data is needed. Empty lines are skipped.
    pub fn decode_line(&mut self) -> Option<String> {
        loop {
            let end = self.buffer.iter().position(|&b| b == b'\n')?;
            let mut line = self.buffer.split_to(end + 1);
            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.truncate(end - 1);
            }
            if !line.is_empty() {
                return Some(String::from_utf8_lossy(&line).to_string());
            }
        }
    }

    /// Encode a command for transmission.
    pub fn encode_command(cmd: &str, terminator: LineTerminator) -> Vec<u8> {
        let tail = terminator.as_bytes();
        let mut buf = Vec::with_capacity(cmd.len() + tail.len());
        buf.extend_from_slice(cmd.as_bytes());
        buf.extend_from_slice(tail);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        assert_eq!(LineCodec::encode_command("g10;", LineTerminator::None), b"g10;");
        assert_eq!(LineCodec::encode_command("g10;", LineTerminator::Lf), b"g10;\n");
    }

    #[test]
    fn test_decode_line() {
        let mut codec = LineCodec::new();
        codec.push(b"[CFG] 0 1\r\n[CFG] 1 0\n").unwrap();

        assert_eq!(codec.decode_line(), Some("[CFG] 0 1".to_string()));
        assert_eq!(codec.decode_line(), Some("[CFG] 1 0".to_string()));
        assert!(codec.decode_line().is_none());
    }

    #[test]
    fn test_partial_line() {
        let mut codec = LineCodec::new();
        codec.push(b"[CFG] 1").unwrap();
        assert!(codec.decode_line().is_none());

        codec.push(b"0 2\r").unwrap();
        assert!(codec.decode_line().is_none());

        codec.push(b"\n").unwrap();
        assert_eq!(codec.decode_line(), Some("[CFG] 10 2".to_string()));
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_skips_empty_lines() {
        let mut codec = LineCodec::new();
        codec.push(b"\r\n\n\r\nready\n").unwrap();
        assert_eq!(codec.decode_line(), Some("ready".to_string()));
    }

    #[test]
    fn test_overlong_line_is_dropped() {
        let mut codec = LineCodec::new();
        codec.push(b"ok\n").unwrap();
        let junk = vec![b'x'; MAX_LINE_LENGTH + 1];
        assert!(matches!(
            codec.push(&junk),
            Err(ProtocolError::LineTooLong { .. })
        ));
        // Still inside the dropped line.
        codec.push(b"yyy").unwrap();
        codec.push(b"zz\n[CFG] 9 1\n").unwrap();

        assert_eq!(codec.decode_line(), Some("ok".to_string()));
        assert_eq!(codec.decode_line(), Some("[CFG] 9 1".to_string()));
        assert!(codec.decode_line().is_none());
    }
}
