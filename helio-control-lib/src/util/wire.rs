use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Prefix of every discovery packet.
pub const MAGIC: &[u8; 6] = b"HELIOS";

/// Hardware address used when a query is addressed to every fixture.
pub const BROADCAST_HARDWARE_ADDRESS: &str = "FF:FF:FF:FF:FF:FF";

/// Magic, hardware address, command, reserved byte and payload length.
pub const HEADER_LEN: usize = 16;

/// Offset of the command byte inside a packet.
pub const COMMAND_OFFSET: usize = 12;

/// Command codes understood by the fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Asks every fixture on the network to identify itself.
    Query = 0,
    /// A fixture's answer to [`Command::Query`], carrying its network info as XML.
    InfoReply = 6,
}

impl Command {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The byte this command occupies on the wire.
    pub fn wire_byte(self) -> Result<u8> {
        command_byte(self.code())
    }
}

/// Converts a command code into its on-wire byte.
///
/// The code is printed as two decimal digits and those digits are read back as
/// one hex byte, so `6` becomes `0x06` but `10` becomes `0x10`. The fixtures
/// expect exactly this, so codes above 99 cannot be represented.
pub fn command_byte(code: u8) -> Result<u8> {
    let digits = format!("{:02}", code);
    let decoded = hex::decode(&digits)
        .map_err(|e| Error::WireEncoding(format!("command code {}: {}", code, e)))?;
    match decoded.as_slice() {
        [byte] => Ok(*byte),
        _ => Err(Error::WireEncoding(format!(
            "command code {} does not fit in one byte",
            code
        ))),
    }
}

/// Parses a colon separated hardware address such as `64:1A:10:10:10:10`.
pub fn parse_hardware_address(address: &str) -> Result<[u8; 6]> {
    let mut bytes = [0u8; 6];
    let mut parts = address.split(':');
    for byte in bytes.iter_mut() {
        let part = parts.next().ok_or_else(|| {
            Error::WireEncoding(format!("hardware address too short: {}", address))
        })?;
        if part.len() != 2 {
            return Err(Error::WireEncoding(format!(
                "invalid hardware address octet {:?} in {}",
                part, address
            )));
        }
        *byte = u8::from_str_radix(part, 16).map_err(|e| {
            Error::WireEncoding(format!("invalid hardware address {}: {}", address, e))
        })?;
    }
    if parts.next().is_some() {
        return Err(Error::WireEncoding(format!(
            "hardware address too long: {}",
            address
        )));
    }
    Ok(bytes)
}

/// Builds a command packet.
///
/// Layout: magic, six address bytes, command byte, a zero byte, the payload
/// length as little-endian `u16`, then the payload itself.
pub fn encode_command(
    command: u8,
    hardware_address: &str,
    payload: Option<&[u8]>,
) -> Result<Bytes> {
    let address = parse_hardware_address(hardware_address)?;
    let command = command_byte(command)?;
    let payload = payload.unwrap_or_default();
    let length = u16::try_from(payload.len()).map_err(|_| {
        Error::WireEncoding(format!("payload of {} bytes is too large", payload.len()))
    })?;

    let mut packet = BytesMut::with_capacity(HEADER_LEN + payload.len());
    packet.put_slice(MAGIC);
    packet.put_slice(&address);
    packet.put_u8(command);
    packet.put_u8(0);
    packet.put_u16_le(length);
    packet.put_slice(payload);
    Ok(packet.freeze())
}
