//! MAVLink frame codec
//!
//! Thin layer over the `mavlink` crate: encodes outgoing messages with our
//! own sequence counter and splits a byte stream back into whole frames.
//! Frame bytes are kept verbatim so they can be logged exactly as sent or
//! received.

use mavlink::ardupilotmega::MavMessage;
use mavlink::peek_reader::PeekReader;
use mavlink::{MavHeader, MavlinkVersion};
use std::io::Cursor;

pub const MAGIC_V1: u8 = 0xFE;
pub const MAGIC_V2: u8 = 0xFD;

/// Ground station identity used for everything we send.
pub const SOURCE_SYSTEM: u8 = 255;
pub const SOURCE_COMPONENT: u8 = 0;

const V1_OVERHEAD: usize = 8; // 6 header + 2 crc
const V2_OVERHEAD: usize = 12; // 10 header + 2 crc
const V2_SIGNATURE_LEN: usize = 13;
const V2_FLAG_SIGNED: u8 = 0x01;

/// Largest frame either protocol version can produce
pub const MAX_FRAME_LEN: usize = V2_OVERHEAD + 255 + V2_SIGNATURE_LEN;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode {name}: {reason}")]
    Encode { name: &'static str, reason: String },

    #[error("{0} encoded to an empty frame")]
    EmptyFrame(&'static str),

    #[error("not a MAVLink frame (first byte 0x{0:02x})")]
    BadMagic(u8),

    /// No frame with a valid checksum starts at the first byte. Usually a
    /// stray magic byte in the stream.
    #[error("frame failed its checksum")]
    Checksum,

    #[error("failed to decode frame: {0}")]
    Decode(String),
}

/// Encodes messages into complete wire frames.
#[derive(Debug, Clone)]
pub struct Encoder {
    version: MavlinkVersion,
    system_id: u8,
    component_id: u8,
    sequence: u8,
}

impl Encoder {
    pub fn new(version: MavlinkVersion) -> Self {
        Self {
            version,
            system_id: SOURCE_SYSTEM,
            component_id: SOURCE_COMPONENT,
            sequence: 0,
        }
    }

    pub fn version(&self) -> MavlinkVersion {
        self.version
    }

    /// Encode one message, consuming a sequence number.
    pub fn encode(&mut self, message: &MavMessage) -> Result<Vec<u8>, CodecError> {
        let header = MavHeader {
            system_id: self.system_id,
            component_id: self.component_id,
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);

        let name = mavlink::Message::message_name(message);
        let mut buf = Cursor::new(Vec::with_capacity(MAX_FRAME_LEN));
        let written = match self.version {
            MavlinkVersion::V2 => mavlink::write_v2_msg(&mut buf, header, message),
            MavlinkVersion::V1 => mavlink::write_v1_msg(&mut buf, header, message),
        }
        .map_err(|e| CodecError::Encode {
            name,
            reason: format!("{e:?}"),
        })?;

        if written == 0 {
            return Err(CodecError::EmptyFrame(name));
        }

        Ok(buf.into_inner())
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(MavlinkVersion::V2)
    }
}

/// Result of scanning a buffer for the next frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// No magic byte anywhere; the whole buffer is garbage.
    Garbage,
    /// A frame starts at `skip` but more bytes are needed.
    Incomplete { skip: usize },
    /// A complete frame of `len` bytes starts at `skip`.
    Frame { skip: usize, len: usize },
}

/// Locate the next frame in `buf` using only the protocol's own framing.
pub fn scan_frame(buf: &[u8]) -> Scan {
    let Some(skip) = buf.iter().position(|&b| b == MAGIC_V1 || b == MAGIC_V2) else {
        return Scan::Garbage;
    };

    let rest = &buf[skip..];
    if rest.len() < 2 {
        return Scan::Incomplete { skip };
    }

    let payload_len = rest[1] as usize;
    let len = if rest[0] == MAGIC_V2 {
        if rest.len() < 3 {
            return Scan::Incomplete { skip };
        }
        let base = V2_OVERHEAD + payload_len;
        if rest[2] & V2_FLAG_SIGNED != 0 {
            base + V2_SIGNATURE_LEN
        } else {
            base
        }
    } else {
        V1_OVERHEAD + payload_len
    };

    if rest.len() < len {
        Scan::Incomplete { skip }
    } else {
        Scan::Frame { skip, len }
    }
}

/// Decode exactly one frame.
///
/// The whole of `frame` must be a single frame with a valid checksum; a
/// valid frame found further inside it does not count.
pub fn decode(frame: &[u8]) -> Result<(MavHeader, MavMessage), CodecError> {
    let Some(&magic) = frame.first() else {
        return Err(CodecError::Decode("empty frame".to_string()));
    };

    let mut reader = PeekReader::new(Cursor::new(frame));
    let (version, id, header, payload) = match magic {
        MAGIC_V2 => {
            let raw = mavlink::read_v2_raw_message::<MavMessage, _>(&mut reader)
                .map_err(|_| CodecError::Checksum)?;
            if raw.raw_bytes() != frame {
                return Err(CodecError::Checksum);
            }
            let header = MavHeader {
                system_id: raw.system_id(),
                component_id: raw.component_id(),
                sequence: raw.sequence(),
            };
            (MavlinkVersion::V2, raw.message_id(), header, raw.payload().to_vec())
        }
        MAGIC_V1 => {
            let raw = mavlink::read_v1_raw_message::<MavMessage, _>(&mut reader)
                .map_err(|_| CodecError::Checksum)?;
            if raw.raw_bytes() != frame {
                return Err(CodecError::Checksum);
            }
            let header = MavHeader {
                system_id: raw.system_id(),
                component_id: raw.component_id(),
                sequence: raw.sequence(),
            };
            (MavlinkVersion::V1, u32::from(raw.message_id()), header, raw.payload().to_vec())
        }
        other => return Err(CodecError::BadMagic(other)),
    };

    let message = <MavMessage as mavlink::Message>::parse(version, id, &payload)
        .map_err(|e| CodecError::Decode(format!("message id {id}: {e:?}")))?;
    Ok((header, message))
}

/// Like [`scan_frame`], but a complete candidate that fails its checksum is
/// treated as a stray magic byte and scanning resumes one byte after it.
///
/// Frames with a valid checksum are reported even if their message cannot be
/// parsed, since their length is trustworthy.
pub fn find_frame(buf: &[u8]) -> Scan {
    let mut from = 0;
    loop {
        match scan_frame(&buf[from..]) {
            Scan::Frame { skip, len } => {
                let start = from + skip;
                match decode(&buf[start..start + len]) {
                    Err(CodecError::Checksum) => from = start + 1,
                    _ => return Scan::Frame { skip: start, len },
                }
            }
            Scan::Incomplete { skip } => return Scan::Incomplete { skip: from + skip },
            Scan::Garbage => return Scan::Garbage,
        }
    }
}

/// Human readable message type, e.g. `GPS_INPUT`
pub fn message_name(message: &MavMessage) -> &'static str {
    mavlink::Message::message_name(message)
}

/// Convert a NUL padded MAVLink char array into a string.
pub fn c_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
