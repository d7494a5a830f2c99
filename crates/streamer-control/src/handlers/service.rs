//! Service control and status opcodes (CSPS/SSPS, CSSA, CSSS, CSSR, CSSD,
//! SSFL, SSPC, SSLA, SSLM, SSPL — §4.3, §6).

use streamer_proto::{ErrorCode, FieldError, Message, Opcode};

use crate::collaborators::CollabError;
use crate::dispatch::write_rerr;
use crate::handlers::output::write_pid_reply;
use crate::state::ServerState;

fn write_collab_result(msg: &mut Message, result: Result<(), CollabError>) {
    match result {
        Ok(()) => write_rerr(msg, ErrorCode::Ok, ""),
        Err(CollabError::NotFound) => write_rerr(msg, ErrorCode::NotFound, "Service not found"),
        Err(CollabError::Exists) => write_rerr(msg, ErrorCode::Exists, "Already exists"),
        Err(CollabError::Streaming) => write_rerr(msg, ErrorCode::Streaming, "Service is streaming"),
        Err(CollabError::Generic(reason)) => write_rerr(msg, ErrorCode::Generic, &reason),
    }
}

/// CSPS (control, requires auth) and SSPS (status, open) share one
/// implementation; §6's table gives SSPS a fixed `RERR(0, name)` shape
/// reporting whichever service is currently primary, while CSPS actually
/// performs the selection. Dispatch routes each opcode here only when its
/// own semantics apply — see the match arms in `dispatch::dispatch`.
pub(crate) fn select_primary(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    if msg.opcode() == u16::from(Opcode::SspsServicePrimarySelect) {
        let name = state.collaborators.service_primary_current().unwrap_or_default();
        write_rerr(msg, ErrorCode::Ok, &name);
        return Ok(());
    }

    let name = msg.read_string()?.unwrap_or_default();
    let result = state.collaborators.service_select_primary(&name);
    write_collab_result(msg, result);
    Ok(())
}

pub(crate) fn secondary_add(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let name = msg.read_string()?.unwrap_or_default();
    let mrl = msg.read_string()?.unwrap_or_default();
    let result = state.collaborators.service_add_secondary(&name, &mrl);
    write_collab_result(msg, result);
    Ok(())
}

pub(crate) fn secondary_set(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let output = msg.read_string()?.unwrap_or_default();
    let service = msg.read_string()?.unwrap_or_default();
    let result = state.collaborators.service_set_secondary(&output, &service);
    write_collab_result(msg, result);
    Ok(())
}

pub(crate) fn secondary_remove(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let name = msg.read_string()?.unwrap_or_default();
    let result = state.collaborators.service_remove_secondary(&name);
    write_collab_result(msg, result);
    Ok(())
}

pub(crate) fn set_destination(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let name = msg.read_string()?.unwrap_or_default();
    let mrl = msg.read_string()?.unwrap_or_default();
    let result = state.collaborators.service_set_destination(&name, &mrl);
    write_collab_result(msg, result);
    Ok(())
}

/// SSFL: list configured section filters. Response begins with an 8-bit
/// count (§4.3), records are `name, mrl, service`.
pub(crate) fn filter_list(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let filters = state.collaborators.service_filter_list();

    msg.reply(Opcode::Rssl);
    msg.write_u8(0)?;
    let mut count: u8 = 0;
    for filter in &filters {
        msg.write_string(&filter.name)?;
        msg.write_string(&filter.mrl)?;
        msg.write_string(&filter.service)?;
        count += 1;
    }
    let end = msg.len();
    msg.seek(0)?;
    msg.write_u8(count)?;
    msg.seek(end)?;
    Ok(())
}

pub(crate) fn filter_packet_count(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let name = msg.read_string()?.unwrap_or_default();
    match state.collaborators.service_filter_packet_count(&name) {
        None => write_rerr(msg, ErrorCode::NotFound, "Filter not found"),
        Some(count) => {
            msg.reply(Opcode::Ropc);
            msg.write_u32(count)?;
        }
    }
    Ok(())
}

/// SSLA (all services) / SSLM (current multiplex only). Response begins
/// with a 16-bit count (§4.3), followed by one `s` per service name.
pub(crate) fn list(state: &ServerState, msg: &mut Message, current_multiplex_only: bool) -> Result<(), FieldError> {
    let services = state.collaborators.service_list(current_multiplex_only);

    msg.reply(Opcode::Rls);
    msg.write_u16(0)?;
    for service in &services {
        msg.write_string(service)?;
    }
    let end = msg.len();
    msg.seek(0)?;
    msg.write_u16(services.len() as u16)?;
    msg.seek(end)?;
    Ok(())
}

pub(crate) fn pids(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let name = msg.read_string()?.unwrap_or_default();
    match state.collaborators.service_pids(&name) {
        None => write_rerr(msg, ErrorCode::NotFound, "Service not found"),
        Some(pids) => write_pid_reply(msg, &pids)?,
    }
    Ok(())
}
