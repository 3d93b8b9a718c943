//! Polling presenter for a streamed turn.
//!
//! Samples the coordinator's snapshot on a fixed cadence, prints only the
//! text it has not printed yet, and finishes from History once the turn
//! settles.

use std::time::Duration;

use tracing::debug;

use crate::messaging::{Spinner, SpinnerHandle, TerminalRenderer};
use crate::session::TurnCoordinator;

/// The part of `text` beyond the first `printed` bytes.
///
/// Empty when `text` is shorter than `printed` or `printed` is not a char
/// boundary, so a reply that diverged from what was shown is never sliced
/// mid-character.
pub fn unseen_suffix(text: &str, printed: usize) -> &str {
    if printed <= text.len() && text.is_char_boundary(printed) {
        &text[printed..]
    } else {
        ""
    }
}

/// Drives the terminal while one turn streams.
pub struct TurnPresenter {
    renderer: TerminalRenderer,
    poll_interval: Duration,
    show_spinner: bool,
}

impl TurnPresenter {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            renderer: TerminalRenderer::new(),
            poll_interval,
            show_spinner: true,
        }
    }

    /// Disable the "Thinking..." spinner (for non-interactive output).
    pub fn without_spinner(mut self) -> Self {
        self.show_spinner = false;
        self
    }

    /// Submit `text` and render the reply as it streams.
    ///
    /// Returns `Ok(true)` if the turn produced a reply and `Ok(false)` if it
    /// ended in an error entry. A rejected submission is an `Err`.
    pub async fn present(&self, coordinator: &TurnCoordinator, text: &str) -> anyhow::Result<bool> {
        let handle = coordinator.submit(text)?;
        self.renderer.render_reply_header(&coordinator.model_name())?;

        let mut spinner = self
            .show_spinner
            .then(|| Spinner::new().start("Thinking..."));
        let mut printed = 0;
        let mut polls = 0u64;

        loop {
            let snapshot = coordinator.snapshot();
            polls += 1;
            if !snapshot.busy {
                break;
            }
            let delta = unseen_suffix(&snapshot.partial, printed);
            if !delta.is_empty() {
                stop_spinner(&mut spinner).await;
                self.renderer.render_delta(delta)?;
                printed = snapshot.partial.len();
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        stop_spinner(&mut spinner).await;
        coordinator.take_completion();
        debug!(polls, finished = handle.is_finished(), "Turn settled");

        match coordinator.last_message() {
            Some(message) if message.is_error() => {
                if printed > 0 {
                    self.renderer.render_reply_end()?;
                }
                self.renderer.render_error(&message.text)?;
                Ok(false)
            }
            Some(message) => {
                self.renderer
                    .render_delta(unseen_suffix(&message.text, printed))?;
                self.renderer.render_reply_end()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

async fn stop_spinner(spinner: &mut Option<SpinnerHandle>) {
    if let Some(handle) = spinner.take() {
        handle.stop().await;
    }
}
