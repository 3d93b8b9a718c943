//! Lock-protected record of the in-flight turn.
//!
//! `SessionState` is the only thing shared between the stream worker and the
//! presenter. Every read and write goes through one mutex, and readers get a
//! [`SessionSnapshot`] copy so they can never observe a torn combination of
//! fields.
//!
//! Starting a turn hands out a [`TurnTicket`]. Appending chunks and settling
//! the turn require that ticket, and settling consumes it, so a turn can only
//! be finished once and only after it was started.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use super::TurnError;

/// Point-in-time copy of the session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// A worker is currently generating a reply.
    pub busy: bool,
    /// Text streamed so far for the in-flight reply.
    pub partial: String,
    /// A turn settled and the presenter has not consumed it yet.
    pub just_completed: bool,
    /// Error text of the last failed turn, until the next turn starts.
    pub last_error: Option<String>,
}

/// Proof that a turn was started. Not cloneable.
#[derive(Debug)]
pub struct TurnTicket {
    turn_id: u64,
}

impl TurnTicket {
    pub fn turn_id(&self) -> u64 {
        self.turn_id
    }
}

#[derive(Debug, Default)]
struct StateInner {
    snapshot: SessionSnapshot,
    turn_id: u64,
}

/// Shared, cloneable handle to the session state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    inner: Arc<Mutex<StateInner>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves the record consistent, so a poisoned lock
    // is still safe to use.
    fn lock(&self) -> MutexGuard<'_, StateInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Begin a turn.
    ///
    /// Fails with [`TurnError::AlreadyBusy`] if a turn is in flight.
    pub fn start(&self) -> Result<TurnTicket, TurnError> {
        let mut inner = self.lock();
        if inner.snapshot.busy {
            return Err(TurnError::AlreadyBusy);
        }
        inner.turn_id += 1;
        inner.snapshot = SessionSnapshot {
            busy: true,
            ..SessionSnapshot::default()
        };
        Ok(TurnTicket {
            turn_id: inner.turn_id,
        })
    }

    /// Append a streamed chunk to the partial reply.
    pub fn append_chunk(&self, ticket: &TurnTicket, chunk: &str) {
        let mut inner = self.lock();
        if !Self::owns(&inner, ticket) {
            warn!(turn_id = ticket.turn_id, "Dropping chunk for a settled turn");
            return;
        }
        inner.snapshot.partial.push_str(chunk);
    }

    /// Settle the turn successfully.
    pub fn finish(&self, ticket: TurnTicket) {
        self.settle(ticket, None);
    }

    /// Settle the turn as failed, keeping the error text.
    pub fn fail(&self, ticket: TurnTicket, error: impl Into<String>) {
        self.settle(ticket, Some(error.into()));
    }

    fn settle(&self, ticket: TurnTicket, error: Option<String>) {
        let mut inner = self.lock();
        if !Self::owns(&inner, &ticket) {
            warn!(turn_id = ticket.turn_id, "Ignoring stale turn ticket");
            return;
        }
        inner.snapshot.busy = false;
        inner.snapshot.partial.clear();
        inner.snapshot.just_completed = true;
        inner.snapshot.last_error = error;
    }

    fn owns(inner: &StateInner, ticket: &TurnTicket) -> bool {
        inner.snapshot.busy && inner.turn_id == ticket.turn_id
    }

    /// Consistent copy of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().snapshot.busy
    }

    /// Return the completion flag and clear it.
    pub fn take_completion(&self) -> bool {
        std::mem::take(&mut self.lock().snapshot.just_completed)
    }

    /// Run `f` while holding the lock, but only if no turn is in flight.
    ///
    /// `start()` cannot interleave with `f`. `f` must not touch this state.
    pub fn with_idle<R>(&self, f: impl FnOnce() -> R) -> Result<R, TurnError> {
        let inner = self.lock();
        if inner.snapshot.busy {
            return Err(TurnError::AlreadyBusy);
        }
        let result = f();
        drop(inner);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Lifecycle Tests
    // =========================================================================

    #[test]
    fn test_initial_state_is_idle() {
        let state = SessionState::new();
        assert_eq!(state.snapshot(), SessionSnapshot::default());
        assert!(!state.is_busy());
    }

    #[test]
    fn test_start_sets_busy() {
        let state = SessionState::new();
        let _ticket = state.start().unwrap();

        let snap = state.snapshot();
        assert!(snap.busy);
        assert_eq!(snap.partial, "");
        assert!(!snap.just_completed);
    }

    #[test]
    fn test_start_while_busy_fails() {
        let state = SessionState::new();
        let _ticket = state.start().unwrap();

        assert_eq!(state.start().unwrap_err(), TurnError::AlreadyBusy);
        assert!(state.is_busy());
    }

    #[test]
    fn test_append_chunk_grows_partial() {
        let state = SessionState::new();
        let ticket = state.start().unwrap();

        state.append_chunk(&ticket, "Hel");
        state.append_chunk(&ticket, "");
        state.append_chunk(&ticket, "lo");

        assert_eq!(state.snapshot().partial, "Hello");
    }

    #[test]
    fn test_finish_clears_partial_and_flags_completion() {
        let state = SessionState::new();
        let ticket = state.start().unwrap();
        state.append_chunk(&ticket, "Hello");

        state.finish(ticket);

        let snap = state.snapshot();
        assert!(!snap.busy);
        assert_eq!(snap.partial, "");
        assert!(snap.just_completed);
        assert!(snap.last_error.is_none());
    }

    #[test]
    fn test_fail_records_error() {
        let state = SessionState::new();
        let ticket = state.start().unwrap();
        state.append_chunk(&ticket, "Par");

        state.fail(ticket, "Error: boom");

        let snap = state.snapshot();
        assert!(!snap.busy);
        assert_eq!(snap.partial, "");
        assert!(snap.just_completed);
        assert_eq!(snap.last_error.as_deref(), Some("Error: boom"));
    }

    #[test]
    fn test_start_resets_previous_turn_flags() {
        let state = SessionState::new();
        let ticket = state.start().unwrap();
        state.fail(ticket, "Error: boom");

        let _ticket = state.start().unwrap();

        let snap = state.snapshot();
        assert!(!snap.just_completed);
        assert!(snap.last_error.is_none());
    }

    #[test]
    fn test_stale_ticket_is_ignored() {
        let state = SessionState::new();
        let first = state.start().unwrap();
        // Settle through a fresh ticket id to simulate a mismatched owner.
        let stale = TurnTicket {
            turn_id: first.turn_id() + 10,
        };

        state.append_chunk(&stale, "nope");
        state.finish(stale);

        let snap = state.snapshot();
        assert!(snap.busy);
        assert_eq!(snap.partial, "");
        state.finish(first);
        assert!(!state.is_busy());
    }

    // =========================================================================
    // Read Side Tests
    // =========================================================================

    #[test]
    fn test_snapshot_is_idempotent() {
        let state = SessionState::new();
        let ticket = state.start().unwrap();
        state.append_chunk(&ticket, "abc");

        let a = state.snapshot();
        let b = state.snapshot();
        let c = state.snapshot();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_take_completion_consumes_flag() {
        let state = SessionState::new();
        let ticket = state.start().unwrap();
        state.finish(ticket);

        assert!(state.take_completion());
        assert!(!state.take_completion());
        assert!(!state.snapshot().just_completed);
    }

    #[test]
    fn test_with_idle_runs_when_idle() {
        let state = SessionState::new();
        let result = state.with_idle(|| 42);
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn test_with_idle_rejects_when_busy() {
        let state = SessionState::new();
        let _ticket = state.start().unwrap();

        let mut ran = false;
        let result = state.with_idle(|| ran = true);

        assert_eq!(result, Err(TurnError::AlreadyBusy));
        assert!(!ran);
    }

    // =========================================================================
    // Concurrency Tests
    // =========================================================================

    #[test]
    fn test_concurrent_start_admits_exactly_one() {
        let state = SessionState::new();
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    state.start().ok()
                })
            })
            .collect();

        let tickets: Vec<TurnTicket> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(tickets.len(), 1);
        assert!(state.is_busy());
    }
}
