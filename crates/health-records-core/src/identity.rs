//! Identity provider adapter.
//!
//! Authentication itself happens elsewhere; the core only needs the current
//! owner identifier and a signal when the session changes.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// Callback invoked with the new owner identifier (None after sign-out).
pub type SessionCallback = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// Source of the authenticated user's identity.
pub trait IdentityProvider: Send + Sync {
    /// Owner identifier of the signed-in user, if any.
    fn current_user_id(&self) -> Option<String>;

    /// Register a callback fired on every sign-in or sign-out.
    fn on_session_change(&self, callback: SessionCallback);
}

#[derive(Default)]
struct SessionInner {
    user_id: Option<String>,
    listeners: Vec<SessionCallback>,
}

/// In-process session state, updated by the host on sign-in and sign-out.
#[derive(Default)]
pub struct SessionHandle {
    inner: Mutex<SessionInner>,
}

impl SessionHandle {
    /// Create a signed-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session already signed in as `user_id`.
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let session = Self::new();
        session.lock().user_id = Some(user_id.into());
        session
    }

    /// Mark `user_id` as signed in and notify listeners.
    pub fn sign_in(&self, user_id: impl Into<String>) {
        self.set_user(Some(user_id.into()));
    }

    /// Clear the session and notify listeners.
    pub fn sign_out(&self) {
        self.set_user(None);
    }

    fn set_user(&self, user_id: Option<String>) {
        let listeners = {
            let mut inner = self.lock();
            if inner.user_id == user_id {
                return;
            }
            inner.user_id = user_id.clone();
            inner.listeners.clone()
        };

        debug!(signed_in = user_id.is_some(), "Session changed");
        // Listeners run without the lock held so they may query the session.
        for listener in listeners {
            listener(user_id.as_deref());
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl IdentityProvider for SessionHandle {
    fn current_user_id(&self) -> Option<String> {
        self.lock().user_id.clone()
    }

    fn on_session_change(&self, callback: SessionCallback) {
        self.lock().listeners.push(callback);
    }
}
