//! Streaming-turn coordination.
//!
//! A turn is one user message plus the assistant reply (or error) it
//! produces. This module runs turns on a background worker while a presenter
//! polls for progress.
//!
//! ## Components
//!
//! - [`History`]: append-only log of completed messages
//! - [`SessionState`]: lock-protected busy flag and partial reply
//! - [`StreamWorker`]: drives one turn against a [`ModelClient`](crate::models::ModelClient)
//! - [`TurnCoordinator`]: public entry point enforcing one turn at a time
//!
//! ## Flow
//!
//! ```text
//! submit(text) ──► SessionState::start ──► History::append(user)
//!                                              │
//!                                              ▼
//!                                     spawn StreamWorker
//!                                              │
//!                 chunk ──► SessionState::append_chunk (repeat)
//!                                              │
//!                      History::append(reply | error) ──► finish / fail
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use quanty::session::TurnCoordinator;
//!
//! let coordinator = TurnCoordinator::new(client);
//! let handle = coordinator.submit("hello")?;
//!
//! while coordinator.snapshot().busy {
//!     render(&coordinator.snapshot().partial);
//!     tokio::time::sleep(poll_interval).await;
//! }
//! let reply = coordinator.last_message();
//! ```

mod coordinator;
mod error;
mod history;
mod message;
mod state;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{TurnCoordinator, TurnHandle, DEFAULT_CHUNK_DELAY};
pub use error::TurnError;
pub use history::History;
pub use message::{ChatMessage, MessageRole, ERROR_PREFIX};
pub use state::{SessionSnapshot, SessionState, TurnTicket};
pub use worker::{StreamWorker, TurnContext, TurnOutcome, ABORTED_REASON};
