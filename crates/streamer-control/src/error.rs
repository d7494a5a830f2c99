use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Proto(#[from] streamer_proto::Error),

    #[error("no free connection slot")]
    NoFreeSlot,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
