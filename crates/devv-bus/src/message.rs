//! The wire frame carried by the pub/sub transport.
//!
//! ```text
//! header(u8)=0x34 || index(u32) || type(u32) ||
//! uri_len(u32) || uri_bytes || data_len(u32) || data_bytes
//! ```
//!
//! Payloads are opaque to the transport; the core interprets them by the
//! message type.

use tracing::debug;

use crate::errors::{BusError, BusResult};

/// Fixed first byte of every frame.
pub const MESSAGE_HEADER: u8 = 0x34;

/// The kinds of messages shard peers exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    FinalBlock = 0,
    ProposalBlock = 1,
    TransactionAnnouncement = 2,
    Valid = 3,
    RequestBlock = 4,
    GetBlocksSince = 5,
    BlocksSince = 6,
}

impl TryFrom<u32> for MessageType {
    type Error = BusError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::FinalBlock),
            1 => Ok(MessageType::ProposalBlock),
            2 => Ok(MessageType::TransactionAnnouncement),
            3 => Ok(MessageType::Valid),
            4 => Ok(MessageType::RequestBlock),
            5 => Ok(MessageType::GetBlocksSince),
            6 => Ok(MessageType::BlocksSince),
            other => Err(BusError::UnknownMessageType { value: other }),
        }
    }
}

/// One pub/sub frame: a topic URI, a message type, and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub uri: String,
    pub message_type: MessageType,
    pub payload: Vec<u8>,
    pub index: u32,
}

impl Message {
    /// Create a message.
    pub fn new(
        uri: impl Into<String>,
        message_type: MessageType,
        payload: Vec<u8>,
        index: u32,
    ) -> Self {
        Self {
            uri: uri.into(),
            message_type,
            payload,
            index,
        }
    }

    /// Serialize the frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(13 + self.uri.len() + self.payload.len() + 4);
        out.push(MESSAGE_HEADER);
        out.extend_from_slice(&self.index.to_le_bytes());
        out.extend_from_slice(&(self.message_type as u32).to_le_bytes());
        out.extend_from_slice(&(self.uri.len() as u32).to_le_bytes());
        out.extend_from_slice(self.uri.as_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Deserialize a frame.
    pub fn decode(bytes: &[u8]) -> BusResult<Self> {
        let mut cursor = Cursor::new(bytes);

        let header = cursor.u8()?;
        if header != MESSAGE_HEADER {
            return Err(BusError::MalformedFrame {
                reason: format!("bad header byte 0x{header:02x}"),
            });
        }
        let index = cursor.u32()?;
        let message_type = MessageType::try_from(cursor.u32()?)?;

        let uri_len = cursor.u32()? as usize;
        let uri_bytes = cursor.bytes(uri_len)?;
        let uri = String::from_utf8(uri_bytes.to_vec()).map_err(|_| BusError::MalformedFrame {
            reason: "uri is not utf-8".into(),
        })?;

        let data_len = cursor.u32()? as usize;
        let payload = cursor.bytes(data_len)?.to_vec();

        if cursor.remaining() != 0 {
            return Err(BusError::MalformedFrame {
                reason: format!("{} trailing bytes", cursor.remaining()),
            });
        }

        Ok(Self {
            uri,
            message_type,
            payload,
            index,
        })
    }
}

/// Log a one-line summary of a message: topic, type, size, index, and a
/// payload prefix.
pub fn log_message_summary(message: &Message, source: &str) {
    const PREFIX: usize = 8;
    let summary = if message.payload.len() <= PREFIX * 2 {
        hex::encode(&message.payload)
    } else {
        format!(
            "{}..{}",
            hex::encode(&message.payload[..PREFIX]),
            hex::encode(&message.payload[message.payload.len() - PREFIX..])
        )
    };
    debug!(
        uri = %message.uri,
        message_type = ?message.message_type,
        size = message.payload.len(),
        index = message.index,
        payload = %summary,
        source,
        "message"
    );
}

/// Minimal checked reader for frame decoding.
struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn bytes(&mut self, count: usize) -> BusResult<&'a [u8]> {
        if self.remaining() < count {
            return Err(BusError::MalformedFrame {
                reason: format!("truncated: needed {count}, had {}", self.remaining()),
            });
        }
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    fn u8(&mut self) -> BusResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u32(&mut self) -> BusResult<u32> {
        let bytes = self.bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
    }
}
