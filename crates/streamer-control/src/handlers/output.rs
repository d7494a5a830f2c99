//! Output control and status opcodes (COAO, CORO, COAP, CORP, COSD, SOLO,
//! SOLP, SOPC — §4.3, §6).

use streamer_proto::{ErrorCode, FieldError, Message, Opcode};

use crate::collaborators::CollabError;
use crate::dispatch::write_rerr;
use crate::state::ServerState;

fn write_collab_result(msg: &mut Message, result: Result<(), CollabError>) {
    match result {
        Ok(()) => write_rerr(msg, ErrorCode::Ok, ""),
        Err(CollabError::NotFound) => write_rerr(msg, ErrorCode::NotFound, "Output not found"),
        Err(CollabError::Exists) => write_rerr(msg, ErrorCode::Exists, "Output already exists"),
        Err(CollabError::Streaming) => write_rerr(msg, ErrorCode::Streaming, "Output is streaming"),
        Err(CollabError::Generic(reason)) => write_rerr(msg, ErrorCode::Generic, &reason),
    }
}

fn read_pid_list(msg: &mut Message) -> Result<Vec<u16>, FieldError> {
    let count = msg.read_u16()?;
    let mut pids = Vec::with_capacity(count as usize);
    for _ in 0..count {
        pids.push(msg.read_u16()?);
    }
    Ok(pids)
}

pub(crate) fn add(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let name = msg.read_string()?.unwrap_or_default();
    let mrl = msg.read_string()?.unwrap_or_default();
    let result = state.collaborators.output_add(&name, &mrl);
    write_collab_result(msg, result);
    Ok(())
}

pub(crate) fn remove(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let name = msg.read_string()?.unwrap_or_default();
    let result = state.collaborators.output_remove(&name);
    write_collab_result(msg, result);
    Ok(())
}

pub(crate) fn pid_add(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let name = msg.read_string()?.unwrap_or_default();
    let pids = read_pid_list(msg)?;
    let result = state.collaborators.output_pid_add(&name, &pids);
    write_collab_result(msg, result);
    Ok(())
}

pub(crate) fn pid_remove(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let name = msg.read_string()?.unwrap_or_default();
    let pids = read_pid_list(msg)?;
    let result = state.collaborators.output_pid_remove(&name, &pids);
    write_collab_result(msg, result);
    Ok(())
}

pub(crate) fn set_destination(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let name = msg.read_string()?.unwrap_or_default();
    let mrl = msg.read_string()?.unwrap_or_default();
    let result = state.collaborators.output_set_destination(&name, &mrl);
    write_collab_result(msg, result);
    Ok(())
}

/// SOLO: list every configured output. §4.3 "Status lists": back-patch an
/// 8-bit placeholder count, then rewrite it once every record is written.
pub(crate) fn list(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let outputs = state.collaborators.output_list();

    msg.reply(Opcode::Rolo);
    msg.write_u8(0)?;
    let mut count: u8 = 0;
    for output in &outputs {
        msg.write_string(&output.name)?;
        msg.write_string(&output.mrl)?;
        count += 1;
    }
    let end = msg.len();
    msg.seek(0)?;
    msg.write_u8(count)?;
    msg.seek(end)?;
    Ok(())
}

/// SOLP: PIDs carried by one output. §9 open question resolves "found but
/// zero PIDs" in favour of always replying with a count, even zero.
pub(crate) fn list_pids(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let name = msg.read_string()?.unwrap_or_default();
    match state.collaborators.output_list_pids(&name) {
        None => write_rerr(msg, ErrorCode::NotFound, "Output not found"),
        Some(pids) => write_pid_reply(msg, &pids)?,
    }
    Ok(())
}

pub(crate) fn packet_count(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let name = msg.read_string()?.unwrap_or_default();
    match state.collaborators.output_packet_count(&name) {
        None => write_rerr(msg, ErrorCode::NotFound, "Output not found"),
        Some(count) => {
            msg.reply(Opcode::Ropc);
            msg.write_u32(count)?;
        }
    }
    Ok(())
}

/// Shared by SOLP and SSPL (§6: "SSPL (service PIDs) ... RLP(... as SOLP)").
pub(crate) fn write_pid_reply(msg: &mut Message, pids: &[u16]) -> Result<(), FieldError> {
    msg.reply(Opcode::Rlp);
    msg.write_u16(pids.len() as u16)?;
    for pid in pids {
        msg.write_u16(*pid)?;
    }
    Ok(())
}
