//! The BinaryControl subsystem (§4.2–§4.3): a bounded thread-per-connection
//! TCP server speaking the `streamer-proto` wire protocol, dispatching each
//! request to the handler for its opcode.

mod collaborators;
mod dispatch;
mod error;
mod handlers;
mod server;
mod state;

pub use collaborators::{
    CollabError, Collaborators, FilterInfo, FrontendStatus, OutputInfo, QuoteSink, TsStats,
};
pub use error::Error;
pub use server::{BASE_PORT, ControlServer};
pub use state::Credentials;
