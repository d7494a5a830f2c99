//! Transport-stream and front-end status opcodes (STSS, SFES — §4.3, §6).
//! Neither reads a request payload.

use streamer_proto::{FieldError, Message, Opcode};

use crate::state::ServerState;

pub(crate) fn ts_stats(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let stats = state.collaborators.ts_stats();

    msg.reply(Opcode::Rtss);
    msg.write_u32(stats.packets_received)?;
    msg.write_u32(stats.tei_errors)?;
    msg.write_u32(stats.continuity_errors)?;
    msg.write_u32(stats.scrambled_packets)?;
    msg.write_u32(stats.demux_errors)?;
    Ok(())
}

pub(crate) fn fe_status(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let status = state.collaborators.frontend_status();

    msg.reply(Opcode::Rfes);
    msg.write_u8(u8::from(status.locked))?;
    msg.write_u32(status.bit_error_rate)?;
    msg.write_u16(status.signal_strength)?;
    msg.write_u16(status.signal_quality)?;
    Ok(())
}
