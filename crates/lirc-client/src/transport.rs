//! Line codec for the lircd socket protocol.
//!
//! lircd writes newline-terminated ASCII lines. Button presses arrive as
//! single code lines; replies and broadcasts arrive as packets:
//!
//! ```text
//! 0000000000f40bf0 00 KEY_POWER Samsung_BN59    <- code line
//!
//! BEGIN                                         <- reply packet
//! SIGHUP
//! END
//!
//! BEGIN
//! VERSION
//! SUCCESS
//! DATA
//! 1
//! 0.10.1
//! END
//! ```

use bytes::BytesMut;
use std::io;
use tokio_util::codec::Decoder;

/// Default maximum line length in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// One unit decoded from the lircd stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// A code line, without its terminating newline
    Code(String),
    /// A `BEGIN` .. `END` packet
    Reply(Reply),
}

/// Reply or broadcast packet sent by lircd
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub command: String,
    /// `Some(true)` for `SUCCESS`, `Some(false)` for `ERROR`, `None` for broadcasts
    pub success: Option<bool>,
    pub data: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyState {
    Command,
    Status,
    DataCount,
    Data(usize),
    End,
}

/// Codec splitting the lircd byte stream into [`Packet`]s
#[derive(Debug)]
pub struct LircdCodec {
    max_line_length: usize,
    reply: Option<(ReplyState, Reply)>,
}

impl Default for LircdCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl LircdCodec {
    #[must_use]
    pub fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            reply: None,
        }
    }

    /// Whether a reply packet is partially decoded.
    #[must_use]
    pub fn in_reply(&self) -> bool {
        self.reply.is_some()
    }

    fn next_line(&self, src: &mut BytesMut) -> Result<Option<String>, CodecError> {
        let Some(newline) = src.iter().position(|b| *b == b'\n') else {
            if src.len() > self.max_line_length {
                return Err(CodecError::LineTooLong(src.len()));
            }
            return Ok(None);
        };

        if newline > self.max_line_length {
            return Err(CodecError::LineTooLong(newline));
        }

        let line = src.split_to(newline + 1);
        let text = String::from_utf8_lossy(&line[..newline]);
        Ok(Some(text.trim_end_matches('\r').to_string()))
    }

    fn feed(&mut self, line: String) -> Result<Option<Packet>, CodecError> {
        let Some((state, mut reply)) = self.reply.take() else {
            if line == "BEGIN" {
                self.reply = Some((ReplyState::Command, Reply::default()));
                return Ok(None);
            }
            if line.trim().is_empty() {
                return Ok(None);
            }
            return Ok(Some(Packet::Code(line)));
        };

        let next = match state {
            ReplyState::Command => {
                reply.command = line;
                ReplyState::Status
            }
            ReplyState::Status | ReplyState::End if line == "END" => {
                return Ok(Some(Packet::Reply(reply)));
            }
            ReplyState::Status => match line.as_str() {
                "SUCCESS" => {
                    reply.success = Some(true);
                    ReplyState::Status
                }
                "ERROR" => {
                    reply.success = Some(false);
                    ReplyState::Status
                }
                "DATA" => ReplyState::DataCount,
                _ => return Err(CodecError::MalformedReply(line)),
            },
            ReplyState::DataCount => {
                let count: usize = line
                    .trim()
                    .parse()
                    .map_err(|_| CodecError::MalformedReply(line.clone()))?;
                if count == 0 {
                    ReplyState::End
                } else {
                    ReplyState::Data(count)
                }
            }
            ReplyState::Data(remaining) => {
                reply.data.push(line);
                if remaining == 1 {
                    ReplyState::End
                } else {
                    ReplyState::Data(remaining - 1)
                }
            }
            ReplyState::End => return Err(CodecError::MalformedReply(line)),
        };

        self.reply = Some((next, reply));
        Ok(None)
    }
}

impl Decoder for LircdCodec {
    type Item = Packet;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(line) = self.next_line(src)? {
            if let Some(packet) = self.feed(line)? {
                return Ok(Some(packet));
            }
        }
        Ok(None)
    }
}

/// Errors that can occur while decoding the lircd stream
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Line too long: {0} bytes")]
    LineTooLong(usize),

    #[error("Malformed reply packet near line '{0}'")]
    MalformedReply(String),
}

impl CodecError {
    /// Whether the stream can no longer be trusted after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MalformedReply(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(text: &str) -> BytesMut {
        BytesMut::from(text.as_bytes())
    }

    #[test]
    fn test_decode_code_line() {
        let mut codec = LircdCodec::default();
        let mut src = buf("0000000000f40bf0 00 KEY_POWER Samsung\n");

        let packet = codec.decode(&mut src).unwrap();
        assert_eq!(
            packet,
            Some(Packet::Code("0000000000f40bf0 00 KEY_POWER Samsung".to_string()))
        );
        assert!(src.is_empty());
    }

    #[test]
    fn test_decode_partial_line() {
        let mut codec = LircdCodec::default();
        let mut src = buf("0000000000f40bf0 00 KEY");

        assert!(codec.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(b"_POWER Samsung\n");
        assert!(matches!(codec.decode(&mut src).unwrap(), Some(Packet::Code(_))));
    }

    #[test]
    fn test_decode_one_packet_per_call() {
        let mut codec = LircdCodec::default();
        let mut src = buf("a 00 KEY_1 r\nb 00 KEY_2 r\n");

        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Packet::Code("a 00 KEY_1 r".to_string()))
        );
        assert_eq!(src.as_ref(), b"b 00 KEY_2 r\n");
    }

    #[test]
    fn test_decode_sighup_broadcast() {
        let mut codec = LircdCodec::default();
        let mut src = buf("BEGIN\nSIGHUP\nEND\n");

        let Some(Packet::Reply(reply)) = codec.decode(&mut src).unwrap() else {
            panic!("Expected reply packet");
        };
        assert_eq!(reply.command, "SIGHUP");
        assert_eq!(reply.success, None);
        assert!(reply.data.is_empty());
        assert!(!codec.in_reply());
    }

    #[test]
    fn test_decode_reply_with_data() {
        let mut codec = LircdCodec::default();
        let mut src = buf("BEGIN\nVERSION\nSUCCESS\nDATA\n1\n0.10.1\nEND\n");

        let Some(Packet::Reply(reply)) = codec.decode(&mut src).unwrap() else {
            panic!("Expected reply packet");
        };
        assert_eq!(reply.command, "VERSION");
        assert_eq!(reply.success, Some(true));
        assert_eq!(reply.data, vec!["0.10.1".to_string()]);
    }

    #[test]
    fn test_decode_reply_split_across_reads() {
        let mut codec = LircdCodec::default();
        let mut src = buf("BEGIN\nSIGHUP\n");

        assert!(codec.decode(&mut src).unwrap().is_none());
        assert!(codec.in_reply());

        src.extend_from_slice(b"END\n0 00 KEY_OK r\n");
        assert!(matches!(codec.decode(&mut src).unwrap(), Some(Packet::Reply(_))));
        assert!(matches!(codec.decode(&mut src).unwrap(), Some(Packet::Code(_))));
    }

    #[test]
    fn test_decode_bad_data_count() {
        let mut codec = LircdCodec::default();
        let mut src = buf("BEGIN\nLIST\nSUCCESS\nDATA\nmany\n");

        let err = codec.decode(&mut src).unwrap_err();
        assert!(matches!(err, CodecError::MalformedReply(_)));
        assert!(!err.is_fatal());
        assert!(!codec.in_reply());
    }

    #[test]
    fn test_line_too_long() {
        let mut codec = LircdCodec::new(8);
        let mut src = buf("0123456789abcdef");

        let err = codec.decode(&mut src).unwrap_err();
        assert!(matches!(err, CodecError::LineTooLong(16)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let mut codec = LircdCodec::default();
        let mut src = buf("\n\r\n1 00 KEY_UP r\r\n");

        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(Packet::Code("1 00 KEY_UP r".to_string()))
        );
    }
}
