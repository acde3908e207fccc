//! OSC 1.0 datagram codec.
//!
//! A datagram is laid out as:
//!
//! ```text
//! +------------------+-------------------+----------------------------+
//! | address \0 (pad) | , tags \0 (pad)   | payloads (string/f32/i32)  |
//! +------------------+-------------------+----------------------------+
//! ```
//!
//! Every string-like section is padded with `(n + 4) & !3`, so at least one
//! null byte always follows the content even when it is already aligned.
//! Numbers are big-endian. `T`, `F`, and `I` carry no payload.

use oscq_core::{Argument, Message};
use tracing::debug;

use crate::error::{ProtocolError, ProtocolResult};

const TAG_LIST_MARKER: u8 = b',';

const TAG_FALSE: u8 = b'F';
const TAG_INFINITUM: u8 = b'I';
const TAG_TRUE: u8 = b'T';
const TAG_STRING_ALT: u8 = b'S';
const TAG_STRING: u8 = b's';
const TAG_FLOAT: u8 = b'f';
const TAG_INT: u8 = b'i';

/// Rounds `n` up past the next 4-byte boundary (always adds at least one byte).
#[inline]
pub const fn padded(n: usize) -> usize {
    (n + 4) & !3
}

/// Decodes a datagram.
///
/// Never fails: malformed input is logged and yields [`Message::empty`], so a
/// receive loop can keep going. A datagram that ends right after the address
/// is not malformed: it decodes as that address with no arguments.
pub fn parse(data: &[u8]) -> Message {
    match try_parse(data) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, len = data.len(), "Failed to parse OSC message");
            Message::empty()
        }
    }
}

/// Decodes a datagram, reporting why it is malformed.
///
/// An unrecognised tag yields [`Argument::Unknown`] and consumes no payload
/// bytes, so a payload-carrying tag after it reads from the wrong offset.
/// This matches the behaviour peers already rely on.
pub fn try_parse(data: &[u8]) -> ProtocolResult<Message> {
    let mut reader = Reader::new(data);
    let address = reader.read_string()?;
    let tags = reader.read_tags()?;

    let mut arguments = Vec::with_capacity(tags.len());
    for &tag in tags {
        let arg = match tag {
            TAG_FALSE => Argument::Bool(false),
            TAG_INFINITUM => Argument::Float(f32::INFINITY),
            TAG_TRUE => Argument::Bool(true),
            TAG_STRING | TAG_STRING_ALT => Argument::String(reader.read_string()?),
            TAG_FLOAT => Argument::Float(f32::from_be_bytes(reader.read_word()?)),
            TAG_INT => Argument::Int(i32::from_be_bytes(reader.read_word()?)),
            _ => Argument::Unknown,
        };
        arguments.push(arg);
    }

    Ok(Message { address, arguments })
}

/// Exact encoded size of `message`.
///
/// The tag list is sized by the full argument count, including arguments
/// that are not written.
pub fn encoded_len(message: &Message) -> usize {
    let payload: usize = message.arguments.iter().map(payload_len).sum();
    padded(message.address.len()) + padded(1 + message.arguments.len()) + payload
}

/// Encodes a message.
///
/// [`Argument::Unknown`] gets neither a tag nor a payload: its tag slot stays
/// zeroed, which terminates the tag string for readers. Existing peers depend
/// on this exact output.
pub fn serialize(message: &Message) -> Vec<u8> {
    let mut buf = vec![0u8; encoded_len(message)];
    let mut pos = write_string(&mut buf, 0, &message.address);

    buf[pos] = TAG_LIST_MARKER;
    for (i, arg) in message.arguments.iter().enumerate() {
        if let Some(tag) = type_tag(arg) {
            buf[pos + 1 + i] = tag;
        }
    }
    pos += padded(1 + message.arguments.len());

    for arg in &message.arguments {
        pos = match arg {
            Argument::String(s) => write_string(&mut buf, pos, s),
            Argument::Float(f) => write_word(&mut buf, pos, f.to_be_bytes()),
            Argument::Int(i) => write_word(&mut buf, pos, i.to_be_bytes()),
            Argument::Bool(_) | Argument::Unknown => pos,
        };
    }

    debug_assert_eq!(pos, buf.len());
    buf
}

fn type_tag(arg: &Argument) -> Option<u8> {
    match arg {
        Argument::String(_) => Some(TAG_STRING),
        Argument::Float(_) => Some(TAG_FLOAT),
        Argument::Int(_) => Some(TAG_INT),
        Argument::Bool(true) => Some(TAG_TRUE),
        Argument::Bool(false) => Some(TAG_FALSE),
        Argument::Unknown => None,
    }
}

fn payload_len(arg: &Argument) -> usize {
    match arg {
        Argument::String(s) => padded(s.len()),
        Argument::Float(_) | Argument::Int(_) => 4,
        Argument::Bool(_) | Argument::Unknown => 0,
    }
}

fn write_string(buf: &mut [u8], pos: usize, s: &str) -> usize {
    buf[pos..pos + s.len()].copy_from_slice(s.as_bytes());
    pos + padded(s.len())
}

fn write_word(buf: &mut [u8], pos: usize, word: [u8; 4]) -> usize {
    buf[pos..pos + 4].copy_from_slice(&word);
    pos + 4
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or_default()
    }

    fn read_string(&mut self) -> ProtocolResult<String> {
        let rest = self.remaining();
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::UnterminatedString { offset: self.pos })?;

        let value = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos = padded(self.pos + len);
        Ok(value)
    }

    /// Reads the tag list; a missing marker means no arguments.
    fn read_tags(&mut self) -> ProtocolResult<&'a [u8]> {
        let rest = self.remaining();
        if rest.first() != Some(&TAG_LIST_MARKER) {
            return Ok(&[]);
        }

        let count = rest[1..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::UnterminatedTagList { offset: self.pos })?;

        let tags = &rest[1..1 + count];
        self.pos = padded(self.pos + 1 + count);
        Ok(tags)
    }

    fn read_word(&mut self) -> ProtocolResult<[u8; 4]> {
        let rest = self.remaining();
        if rest.len() < 4 {
            return Err(ProtocolError::Truncated {
                offset: self.pos,
                needed: 4,
                available: rest.len(),
            });
        }

        let mut word = [0u8; 4];
        word.copy_from_slice(&rest[..4]);
        self.pos += 4;
        Ok(word)
    }
}
