use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown message type tag {0}")]
    UnknownMsgType(i32),

    #[error("{0} is not a state payload type")]
    NotStateType(i32),

    #[error("invalid location name '{0}', expected category/group/name/mode")]
    InvalidLocation(String),

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("unknown mode '{0}'")]
    UnknownMode(String),
}
