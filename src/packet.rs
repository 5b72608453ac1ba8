use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RconError;

/// Packet type tag as it appears on the wire.
///
/// The protocol reuses the value `2` for both `SERVERDATA_AUTH_RESPONSE` and
/// `SERVERDATA_EXECCOMMAND`, so the tag is kept as a plain integer and the
/// meaning is picked by the direction the packet travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketType(i32);

impl PacketType {
    // SERVERDATA_AUTH
    pub const AUTH: PacketType = PacketType(3);
    // SERVERDATA_AUTH_RESPONSE
    pub const AUTH_RESPONSE: PacketType = PacketType(2);
    // SERVERDATA_EXECCOMMAND
    pub const COMMAND: PacketType = PacketType(2);
    // SERVERDATA_RESPONSE_VALUE
    pub const RESPONSE: PacketType = PacketType(0);

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn to_le_bytes(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl From<i32> for PacketType {
    fn from(value: i32) -> Self {
        PacketType(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: i32,
    packet_type: PacketType,
    body: String,
}

impl Packet {
    /// ID + type + the two terminators.
    pub const BASE_PACKET_SIZE: i32 = 10;
    pub const MIN_PACKET_SIZE: i32 = Self::BASE_PACKET_SIZE;
    pub const MAX_PACKET_SIZE: i32 = 4096;

    pub fn new(id: i32, packet_type: PacketType, body: &str) -> Self {
        Packet {
            id,
            packet_type,
            body: body.to_string(),
        }
    }

    // Since the only one of these values that can change in length is the body,
    // an easy way to calculate the size of a packet is to find the byte-length
    // of the packet body, then add 10 to it.
    pub fn size(&self) -> i32 {
        self.body.len() as i32 + Self::BASE_PACKET_SIZE
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn body(&self) -> &str {
        self.body.as_ref()
    }

    pub fn pack(&self) -> Vec<u8> {
        // Size, ID, Type, Body, Terminator
        let mut payload = Vec::<u8>::with_capacity(self.size() as usize + 4);
        payload.extend_from_slice(&self.size().to_le_bytes());
        payload.extend_from_slice(&self.id.to_le_bytes());
        payload.extend_from_slice(&self.packet_type.to_le_bytes());
        payload.extend_from_slice(self.body.as_bytes());
        // null terminate the body, then null terminate the entire packet
        payload.extend_from_slice(&[0u8, 0u8]);
        payload
    }

    /// Decodes everything after the length prefix.
    pub fn unpack(incoming: &[u8]) -> Result<Self, RconError> {
        let size = incoming.len() as i32;
        if !(Self::MIN_PACKET_SIZE..=Self::MAX_PACKET_SIZE).contains(&size) {
            return Err(RconError::InvalidPacketSize(size));
        }

        let id = i32::from_le_bytes([incoming[0], incoming[1], incoming[2], incoming[3]]);
        let packet_type = i32::from_le_bytes([incoming[4], incoming[5], incoming[6], incoming[7]]);
        // servers are free to send latin-1 colour codes and the like
        let body = String::from_utf8_lossy(&incoming[8..incoming.len() - 2]).into_owned();

        Ok(Packet {
            id,
            packet_type: packet_type.into(),
            body,
        })
    }

    /// Reads one length-prefixed packet. A stream that ends before the
    /// declared length has arrived yields `ReceiveError`.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, RconError>
    where
        R: AsyncRead + Unpin,
    {
        let size = reader.read_i32_le().await.map_err(RconError::ReceiveError)?;
        if !(Self::MIN_PACKET_SIZE..=Self::MAX_PACKET_SIZE).contains(&size) {
            return Err(RconError::InvalidPacketSize(size));
        }

        let mut buf = vec![0u8; size as usize];
        reader
            .read_exact(&mut buf)
            .await
            .map_err(RconError::ReceiveError)?;

        Self::unpack(&buf)
    }

    /// Writes the whole packet in a single buffer.
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), RconError>
    where
        W: AsyncWrite + Unpin,
    {
        writer
            .write_all(&self.pack())
            .await
            .map_err(RconError::SendError)?;
        writer
            .flush()
            .await
            .map_err(RconError::SendError)
    }
}
