//! Outstanding-acknowledgment bookkeeping
//!
//! Every reliable send registers a [`Notification`] describing the ACK it
//! waits for. The inbound dispatcher resolves notifications as ACKs arrive,
//! which wakes the waiting sender through a oneshot channel.

use log::debug;
use shared::{ControlKind, Frame, RoomId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// "Waiting for a frame of `kind` from `addr` on `room`"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Notification {
    pub addr: SocketAddr,
    pub room: RoomId,
    pub kind: ControlKind,
}

impl Notification {
    pub fn new(addr: SocketAddr, room: RoomId, kind: ControlKind) -> Self {
        Self { addr, room, kind }
    }
}

/// Identifies which frame an ACK refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef {
    pub message_id: u32,
    pub fragment_index: u16,
}

impl FrameRef {
    pub fn of(frame: &Frame) -> Self {
        Self {
            message_id: frame.message_id,
            fragment_index: frame.fragment_index,
        }
    }
}

#[derive(Debug)]
struct Pending {
    /// None accepts any matching ACK
    expected: Option<FrameRef>,
    waker: oneshot::Sender<()>,
}

/// Registry of notifications still waiting for their answer
///
/// Register, resolve and forget all run under one mutex, so an ACK can never
/// be both delivered and forgotten, nor delivered twice.
#[derive(Debug, Default)]
pub struct AckTracker {
    pending: Mutex<HashMap<Notification, Pending>>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Notification, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a notification that any answer matching it resolves
    ///
    /// # Panics
    ///
    /// If an equal notification is still outstanding. At most one send may
    /// wait on a given (address, room, kind) at a time.
    pub fn register(&self, notification: Notification) -> oneshot::Receiver<()> {
        self.insert(notification, None)
    }

    /// Registers a notification that only an answer to `frame` resolves
    ///
    /// Late answers to earlier frames on the same tuple are ignored.
    ///
    /// # Panics
    ///
    /// Same as [`AckTracker::register`].
    pub fn register_for(
        &self,
        notification: Notification,
        frame: FrameRef,
    ) -> oneshot::Receiver<()> {
        self.insert(notification, Some(frame))
    }

    fn insert(
        &self,
        notification: Notification,
        expected: Option<FrameRef>,
    ) -> oneshot::Receiver<()> {
        let (waker, receiver) = oneshot::channel();

        let duplicate = {
            let mut pending = self.lock();
            if pending.contains_key(&notification) {
                true
            } else {
                pending.insert(notification, Pending { expected, waker });
                false
            }
        };

        // raised outside the lock so the mutex is not poisoned
        assert!(
            !duplicate,
            "notification {:?} registered while an equal one is outstanding",
            notification
        );
        receiver
    }

    /// Resolves the outstanding notification equal to `notification`, if any
    ///
    /// Returns false if nothing matched; unsolicited or duplicate answers are
    /// expected and harmless.
    pub fn resolve(&self, notification: &Notification) -> bool {
        self.resolve_matching(notification, None)
    }

    /// Like [`AckTracker::resolve`], for an answer that refers to `frame`
    pub fn resolve_ack(&self, notification: &Notification, frame: FrameRef) -> bool {
        self.resolve_matching(notification, Some(frame))
    }

    fn resolve_matching(&self, notification: &Notification, answer: Option<FrameRef>) -> bool {
        let pending = {
            let mut pending = self.lock();
            let matches = match (pending.get(notification), answer) {
                (None, _) => false,
                (Some(Pending { expected: None, .. }), _) => true,
                (Some(Pending { expected: Some(_), .. }), None) => true,
                (Some(Pending { expected: Some(expected), .. }), Some(answer)) => {
                    *expected == answer
                }
            };
            if !matches {
                debug!("No outstanding notification matches {:?}", notification);
                return false;
            }
            pending.remove(notification)
        };

        match pending {
            Some(pending) => {
                // the waiter may already have given up; that is fine
                let _ = pending.waker.send(());
                true
            }
            None => false,
        }
    }

    /// Drops a notification without resolving it
    ///
    /// Returns true if it was still outstanding.
    pub fn forget(&self, notification: &Notification) -> bool {
        self.lock().remove(notification).is_some()
    }

    pub fn is_pending(&self, notification: &Notification) -> bool {
        self.lock().contains_key(notification)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
