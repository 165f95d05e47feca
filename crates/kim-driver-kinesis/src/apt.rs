//! Thorlabs APT message framing.
//!
//! Every APT message starts with a 6-byte little-endian header: message id
//! (u16), two parameter bytes, destination, source. Messages that carry a
//! data packet replace the parameter bytes with the packet length and set
//! the high bit of the destination byte. The KIM/TIM inertia cubes speak
//! the PZMOT message family for per-channel position and motion.
//!
//! Only encode/parse lives here; serial I/O is in [`crate::kim101`].

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use kim_core::Channel;

/// Host address byte in the APT addressing scheme.
pub const SOURCE_HOST: u8 = 0x01;
/// Generic USB device address (single-cube connections).
pub const DEST_GENERIC_USB: u8 = 0x50;

const DATA_FLAG: u8 = 0x80;
const HEADER_LEN: usize = 6;

/// Message ids used by this driver.
pub mod msg {
    /// Flash the front panel LED (connection check).
    pub const MOD_IDENTIFY: u16 = 0x0223;
    /// Request hardware info.
    pub const HW_REQ_INFO: u16 = 0x0005;
    /// Hardware info response (84-byte data packet).
    pub const HW_GET_INFO: u16 = 0x0006;
    /// Request a PZMOT parameter block.
    pub const PZMOT_REQ_PARAMS: u16 = 0x08C1;
    /// PZMOT parameter block response.
    pub const PZMOT_GET_PARAMS: u16 = 0x08C2;
    /// Absolute move on one channel.
    pub const PZMOT_MOVE_ABSOLUTE: u16 = 0x08D4;
}

/// PZMOT parameter sub-id for the per-channel position counter.
pub const PARAM_POSITION: u16 = 0x05;

/// Framing/parse errors for APT messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AptError {
    #[error("APT message truncated: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Unexpected APT message id {actual:#06x}, expected {expected:#06x}")]
    UnexpectedMessage { expected: u16, actual: u16 },

    #[error("Unexpected PZMOT parameter sub-id {actual:#04x}, expected {expected:#04x}")]
    UnexpectedParameter { expected: u16, actual: u16 },

    #[error("Invalid channel ident {0} in APT response")]
    BadChannel(u16),
}

/// Parsed 6-byte message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub param1: u8,
    pub param2: u8,
    pub dest: u8,
    pub source: u8,
}

impl Header {
    /// Parse a header from exactly six bytes.
    pub fn parse(bytes: [u8; HEADER_LEN]) -> Self {
        Self {
            id: u16::from_le_bytes([bytes[0], bytes[1]]),
            param1: bytes[2],
            param2: bytes[3],
            dest: bytes[4],
            source: bytes[5],
        }
    }

    /// Whether a data packet follows this header.
    pub fn has_data(&self) -> bool {
        self.dest & DATA_FLAG != 0
    }

    /// Length of the trailing data packet. Only meaningful when
    /// [`Header::has_data`] is true; the parameter bytes then hold the
    /// packet length.
    pub fn data_len(&self) -> usize {
        usize::from(u16::from_le_bytes([self.param1, self.param2]))
    }
}

/// Encode a header-only message.
pub fn short(id: u16, param1: u8, param2: u8) -> [u8; HEADER_LEN] {
    let id = id.to_le_bytes();
    [id[0], id[1], param1, param2, DEST_GENERIC_USB, SOURCE_HOST]
}

/// Encode a message with a data packet.
pub fn with_data(id: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u16_le(id);
    buf.put_u16_le(payload.len() as u16);
    buf.put_u8(DEST_GENERIC_USB | DATA_FLAG);
    buf.put_u8(SOURCE_HOST);
    buf.put_slice(payload);
    buf.to_vec()
}

/// Encode a `PZMOT_MOVE_ABSOLUTE` for one channel.
///
/// The drive moves immediately using the step parameters stored on the
/// device; there is no per-move velocity word in this message.
pub fn move_absolute(channel: Channel, position: i32) -> Vec<u8> {
    let mut payload = BytesMut::with_capacity(6);
    payload.put_u16_le(u16::from(channel.index()));
    payload.put_i32_le(position);
    with_data(msg::PZMOT_MOVE_ABSOLUTE, &payload)
}

/// Encode a position-counter request for one channel.
pub fn req_position(channel: Channel) -> [u8; HEADER_LEN] {
    short(msg::PZMOT_REQ_PARAMS, PARAM_POSITION as u8, channel.index())
}

/// Parse the payload of a `PZMOT_GET_PARAMS` position-counter response:
/// sub-id (u16), channel ident (u16), position (i32).
pub fn parse_position(payload: &[u8]) -> Result<(Channel, i32), AptError> {
    if payload.len() < 8 {
        return Err(AptError::Truncated {
            expected: 8,
            actual: payload.len(),
        });
    }
    let mut buf = payload;
    let sub_id = buf.get_u16_le();
    if sub_id != PARAM_POSITION {
        return Err(AptError::UnexpectedParameter {
            expected: PARAM_POSITION,
            actual: sub_id,
        });
    }
    let chan_ident = buf.get_u16_le();
    let channel = u8::try_from(chan_ident)
        .ok()
        .and_then(Channel::new)
        .ok_or(AptError::BadChannel(chan_ident))?;
    let position = buf.get_i32_le();
    Ok((channel, position))
}

/// Hardware info from a `HW_GET_INFO` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwInfo {
    pub serial_number: u32,
    pub model: String,
    /// (major, interim, minor)
    pub firmware: (u8, u8, u8),
    pub num_channels: u16,
}

/// Parse the 84-byte `HW_GET_INFO` data packet: serial (u32), model
/// (8 bytes, NUL padded), hardware type (u16), firmware version (4 bytes),
/// 60 bytes of notes/padding, hardware version (u16), modification state
/// (u16), channel count (u16).
pub fn parse_hw_info(payload: &[u8]) -> Result<HwInfo, AptError> {
    if payload.len() < 84 {
        return Err(AptError::Truncated {
            expected: 84,
            actual: payload.len(),
        });
    }
    let mut buf = payload;
    let serial_number = buf.get_u32_le();
    let model_raw = buf.copy_to_bytes(8);
    let model = String::from_utf8_lossy(&model_raw)
        .trim_end_matches('\0')
        .trim()
        .to_string();
    let _hw_type = buf.get_u16_le();
    let fw_minor = buf.get_u8();
    let fw_interim = buf.get_u8();
    let fw_major = buf.get_u8();
    let _fw_reserved = buf.get_u8();
    buf.advance(60); // notes + padding
    let _hw_version = buf.get_u16_le();
    let _mod_state = buf.get_u16_le();
    let num_channels = buf.get_u16_le();
    Ok(HwInfo {
        serial_number,
        model,
        firmware: (fw_major, fw_interim, fw_minor),
        num_channels,
    })
}
