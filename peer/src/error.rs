use shared::{FragmentError, RoomId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("room {0} is reserved and cannot be joined")]
    ReservedRoom(RoomId),
    #[error("already in room {0}")]
    AlreadyJoined(RoomId),
    #[error("not in room {0}")]
    NotJoined(RoomId),
    #[error("sender for room {0} has stopped")]
    SenderStopped(RoomId),
    #[error(transparent)]
    Fragment(#[from] FragmentError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
