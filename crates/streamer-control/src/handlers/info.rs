//! INFO, AUTH and QUOT (§4.3) — the three handlers that don't reach into a
//! service/output collaborator.

use streamer_proto::{ErrorCode, FieldError, Message, Opcode};

use crate::collaborators::QuoteSink;
use crate::dispatch::write_rerr;
use crate::state::{Connection, ServerState};

const SUBFIELD_NAME: u8 = 0x00;
const SUBFIELD_FETYPE: u8 = 0x01;
const SUBFIELD_AUTHENTICATED: u8 = 0x02;
const SUBFIELD_UPSECS: u8 = 0xFE;
const SUBFIELD_UPTIME: u8 = 0xFF;

fn format_uptime(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    format!("{days} Days {hours} Hours {minutes} Minutes {seconds} seconds")
}

pub(crate) fn info(state: &ServerState, conn: &Connection, msg: &mut Message) -> Result<(), FieldError> {
    let subfield = msg.read_u8()?;
    let text = match subfield {
        SUBFIELD_NAME => state.streamer_name.clone(),
        SUBFIELD_FETYPE => "Not implemented!".to_string(),
        SUBFIELD_AUTHENTICATED => {
            if conn.authenticated { "Authenticated".to_string() } else { "Not authenticated".to_string() }
        }
        SUBFIELD_UPSECS => state.uptime_secs().to_string(),
        SUBFIELD_UPTIME => format_uptime(state.uptime_secs()),
        _ => {
            write_rerr(msg, ErrorCode::Generic, "Unknown info subfield!");
            return Ok(());
        }
    };
    write_rerr(msg, ErrorCode::Ok, &text);
    Ok(())
}

pub(crate) fn auth(state: &ServerState, conn: &mut Connection, msg: &mut Message) -> Result<(), FieldError> {
    let username = msg.read_string()?.unwrap_or_default();
    let password = msg.read_string()?.unwrap_or_default();

    conn.authenticated = state.credentials.matches(&username, &password);

    if conn.authenticated {
        write_rerr(msg, ErrorCode::Ok, "");
    } else {
        write_rerr(msg, ErrorCode::NotAuthorised, "");
    }
    Ok(())
}

/// Bounded sink backing the quote channel's print redirection (§9 "Quote
/// channel print sink"): writes append straight into the reply's payload
/// buffer, truncating silently once the frame fills up rather than growing
/// without bound.
struct MessageSink<'a> {
    msg: &'a mut Message,
}

impl QuoteSink for MessageSink<'_> {
    fn write_str(&mut self, s: &str) {
        // write_bytes-via-write_u8 would reject a partial write; here a
        // truncated append is the desired behaviour, so push what fits.
        for byte in s.as_bytes() {
            if self.msg.write_u8(*byte).is_err() {
                break;
            }
        }
    }
}

pub(crate) fn quot(state: &ServerState, msg: &mut Message) -> Result<(), FieldError> {
    let command = msg.read_string()?.unwrap_or_default();

    msg.reply(Opcode::Rtxt);
    let result = {
        let mut sink = MessageSink { msg };
        state.collaborators.run_command(&command, &mut sink)
    };

    if let Err(_reason) = result {
        write_rerr(msg, ErrorCode::Generic, "Unknown command");
    }
    Ok(())
}
