//! Wire framing and typed field encode/decode for the binary control
//! protocol: `[opcode:2][length:2][payload:length]`, big-endian, with a
//! 65,535-byte payload cap.

mod codec;
mod error;
mod message;
mod opcode;

pub use codec::{recv, send};
pub use error::{Error, FieldError};
pub use message::{MAX_PAYLOAD, Message};
pub use opcode::{ErrorCode, Opcode};
