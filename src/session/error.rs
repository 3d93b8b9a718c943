//! Turn submission errors.

use thiserror::Error;

/// Reasons a turn (or an operation that needs an idle session) is refused.
///
/// Backend failures are not here: they never leave the stream worker and end
/// up in History as error messages instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("A reply is already being generated")]
    AlreadyBusy,
    #[error("Message is empty")]
    EmptyMessage,
}
