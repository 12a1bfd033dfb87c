use thiserror::Error;

use herald_protocol::MsgType;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("{0:?} carries a payload and cannot be written as a marker")]
    NotAMarker(MsgType),

    #[error("no writer for location {0:08x}")]
    NoWriter(u32),

    #[error("location {0:08x} is not known to the journal")]
    UnknownLocation(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
