//! Turn events and terminal output.
//!
//! The coordinator publishes [`TurnEvent`]s on a [`MessageBus`] after each
//! state mutation. The REPL still drives rendering by polling; the bus is
//! there for observers that want push notification (the debug event log).
//!
//! ## Key Components
//!
//! - [`TurnEvent`]: turn lifecycle notifications
//! - [`MessageBus`]: broadcast channel for pub/sub
//! - [`TerminalRenderer`]: colored notices, reply text and history
//! - [`Spinner`]: activity indicator shown before the first chunk arrives

mod bus;
mod renderer;
mod spinner;
mod types;

pub use bus::{BusError, MessageBus, MessageReceiver, MessageSender};
pub use renderer::TerminalRenderer;
pub use spinner::{Spinner, SpinnerHandle};
pub use types::*;
