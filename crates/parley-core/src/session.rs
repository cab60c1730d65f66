//! Session state: the transcript and its single-flight gate

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::message::{ChatMessage, MessageId};

/// The ordered transcript plus the busy flag.
///
/// Messages are only ever appended. Ids come from a per-session counter, and
/// each turn reserves two of them so the reply can take `user_id + 1`.
#[derive(Debug)]
pub struct Session {
    messages: Vec<ChatMessage>,
    busy: bool,
    next_id: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            busy: false,
            next_id: 1,
        }
    }

    /// Append a message to the end of the transcript.
    ///
    /// Returns false (and leaves the transcript untouched) if the message
    /// breaks the user/assistant content invariant.
    pub fn append(&mut self, message: ChatMessage) -> bool {
        if !message.is_valid() {
            warn!(id = %message.id, role = ?message.role, "refusing to append message without content");
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Reserve ids for a user turn and its reply, returning the user id
    pub fn reserve_turn(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 2;
        id
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.messages.clone(),
            busy: self.busy,
        }
    }
}

/// Point-in-time copy of a session for renderers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub messages: Vec<ChatMessage>,
    pub busy: bool,
}

/// Shared handle to a session.
///
/// The lock is only held for synchronous mutations, never across an await.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, Session> {
        // A panic while holding the lock can't leave a half-appended message,
        // so a poisoned session is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().is_busy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ChatRole, ImageRef};

    #[test]
    fn test_new_session_is_empty_and_idle() {
        let session = Session::new();
        assert!(session.is_empty());
        assert!(!session.is_busy());
    }

    #[test]
    fn test_append_preserves_order() {
        let mut session = Session::new();
        let first = session.reserve_turn();
        assert!(session.append(ChatMessage::user(first, Some("one".into()), None)));
        assert!(session.append(ChatMessage::assistant(first.next(), "two")));

        let texts: Vec<&str> = session.messages().iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(session.messages()[1].role, ChatRole::Assistant);
    }

    #[test]
    fn test_append_rejects_empty_user_message() {
        let mut session = Session::new();
        let id = session.reserve_turn();
        assert!(!session.append(ChatMessage::user(id, None, None)));
        assert!(session.is_empty());

        let image = ImageRef::new("x.png", None, 1);
        assert!(session.append(ChatMessage::user(id, None, Some(image))));
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_reserve_turn_leaves_room_for_reply() {
        let mut session = Session::new();
        let a = session.reserve_turn();
        let b = session.reserve_turn();
        assert_eq!(a, MessageId(1));
        assert_eq!(b, MessageId(3));
        assert!(a.next() < b);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let shared = SharedSession::new();
        {
            let mut session = shared.lock();
            let id = session.reserve_turn();
            session.append(ChatMessage::user(id, Some("hi".into()), None));
            session.set_busy(true);
        }
        let snapshot = shared.snapshot();
        shared.lock().set_busy(false);

        assert!(snapshot.busy);
        assert_eq!(snapshot.messages.len(), 1);
        assert!(!shared.is_busy());
    }
}
