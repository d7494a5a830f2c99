use std::io::{Read, Write};

use tracing::debug;

use crate::{
    error::Error,
    message::{MAX_PAYLOAD, Message},
};

const HEADER_LEN: usize = 4; // opcode:2 + length:2

/// Reads one complete frame from `stream` into `msg`, replacing its
/// contents. A short read on either the header or the payload is a
/// [`Error::Disconnect`] — per §7 this is handled by tearing the connection
/// down without a reply, never by retrying.
pub fn recv(stream: &mut impl Read, msg: &mut Message) -> Result<(), Error> {
    let mut header = [0u8; HEADER_LEN];
    read_exact_or_disconnect(stream, &mut header)?;

    let opcode = u16::from_be_bytes([header[0], header[1]]);
    let length = u16::from_be_bytes([header[2], header[3]]) as usize;

    let mut payload = [0u8; MAX_PAYLOAD];
    read_exact_or_disconnect(stream, &mut payload[..length])?;

    msg.fill_from_slice(&payload[..length]);
    msg.set_opcode(opcode);

    debug!(opcode = format_args!("{opcode:#06x}"), length, "recv");
    Ok(())
}

/// Writes `msg` as a complete frame to `stream`.
pub fn send(stream: &mut impl Write, msg: &Message) -> Result<(), Error> {
    let mut header = [0u8; HEADER_LEN];
    header[0..2].copy_from_slice(&msg.opcode().to_be_bytes());
    header[2..4].copy_from_slice(&(msg.len() as u16).to_be_bytes());

    stream.write_all(&header)?;
    stream.write_all(msg.payload())?;
    stream.flush()?;

    debug!(opcode = format_args!("{:#06x}", msg.opcode()), length = msg.len(), "send");
    Ok(())
}

fn read_exact_or_disconnect(stream: &mut impl Read, buf: &mut [u8]) -> Result<(), Error> {
    match stream.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::Disconnect),
        Err(e) => Err(Error::Io(e)),
    }
}
