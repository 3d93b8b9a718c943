//! Turn coordinator: the single entry point for sending a message.
//!
//! The coordinator owns History and SessionState and enforces that at most one
//! turn is outstanding. A presenter calls [`TurnCoordinator::submit`], then
//! either polls [`TurnCoordinator::snapshot`] on its own cadence or listens on
//! [`TurnCoordinator::subscribe`].

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::messaging::{MessageBus, MessageReceiver, TurnEvent};
use crate::models::ModelClient;

use super::worker::ABORTED_REASON;
use super::{
    ChatMessage, History, SessionSnapshot, SessionState, StreamWorker, TurnContext, TurnError,
    TurnOutcome,
};

/// Default pause after each streamed chunk.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(10);

/// Handle to a running turn.
///
/// Dropping it does not cancel anything: the worker keeps running and still
/// commits its result to History.
pub struct TurnHandle {
    join: JoinHandle<TurnOutcome>,
    history: History,
}

impl TurnHandle {
    /// Wait for the worker to settle the turn.
    pub async fn wait(self) -> TurnOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            // The worker's guard already recorded the failure in History.
            Err(_) => TurnOutcome::Failed(
                self.history
                    .last()
                    .filter(ChatMessage::is_error)
                    .unwrap_or_else(|| ChatMessage::error(ABORTED_REASON)),
            ),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Serializes turns and wires workers to shared state.
pub struct TurnCoordinator {
    state: SessionState,
    history: History,
    client: RwLock<Arc<dyn ModelClient>>,
    bus: MessageBus,
    chunk_delay: Duration,
}

impl TurnCoordinator {
    /// Create a coordinator bound to `client`.
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            state: SessionState::new(),
            history: History::new(),
            client: RwLock::new(client),
            bus: MessageBus::new(),
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }

    /// Set the pause applied after each streamed chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Start a turn for `text`.
    ///
    /// Returns immediately; the reply is generated on a background task.
    /// Must be called from within a tokio runtime. Rejected submissions leave
    /// History and state untouched.
    pub fn submit(&self, text: &str) -> Result<TurnHandle, TurnError> {
        if text.trim().is_empty() {
            return Err(TurnError::EmptyMessage);
        }
        if self.state.is_busy() {
            debug!("Rejecting submit while a turn is in flight");
            return Err(TurnError::AlreadyBusy);
        }
        // Reserve the turn before touching History so concurrent callers
        // cannot both append.
        let ticket = self.state.start()?;

        self.history.append(ChatMessage::user(text));
        self.bus.sender().publish(TurnEvent::started(text));

        let ctx = TurnContext {
            text: text.to_string(),
            client: self.client(),
            state: self.state.clone(),
            history: self.history.clone(),
            events: self.bus.sender(),
            chunk_delay: self.chunk_delay,
        };
        let join = StreamWorker::new(ctx).spawn(ticket);
        Ok(TurnHandle {
            join,
            history: self.history.clone(),
        })
    }

    /// Replace the model client and clear History.
    ///
    /// Refused with [`TurnError::AlreadyBusy`] while a turn is in flight.
    pub fn switch_model(&self, client: Arc<dyn ModelClient>) -> Result<(), TurnError> {
        let model = client.model_name().to_string();
        self.state.with_idle(|| {
            self.history.clear();
            *self.client.write().unwrap_or_else(|e| e.into_inner()) = client;
        })?;
        self.bus.sender().publish(TurnEvent::HistoryCleared);
        info!(%model, "Switched model");
        Ok(())
    }

    /// Clear History.
    ///
    /// Refused with [`TurnError::AlreadyBusy`] while a turn is in flight.
    pub fn clear_history(&self) -> Result<(), TurnError> {
        self.state.with_idle(|| self.history.clear())?;
        self.bus.sender().publish(TurnEvent::HistoryCleared);
        Ok(())
    }

    /// Consistent copy of the in-flight turn state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// Consume the "turn just completed" flag.
    pub fn take_completion(&self) -> bool {
        self.state.take_completion()
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    /// Copy of the conversation so far.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.snapshot()
    }

    pub fn last_message(&self) -> Option<ChatMessage> {
        self.history.last()
    }

    /// The active model client.
    pub fn client(&self) -> Arc<dyn ModelClient> {
        self.client.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn model_name(&self) -> String {
        self.client().model_name().to_string()
    }

    /// Subscribe to turn events.
    pub fn subscribe(&self) -> MessageReceiver {
        self.bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::ScriptedClient;
    use crate::session::MessageRole;
    use std::sync::atomic::Ordering;
    use tokio::sync::Notify;

    fn coordinator(client: ScriptedClient) -> TurnCoordinator {
        TurnCoordinator::new(Arc::new(client)).with_chunk_delay(Duration::ZERO)
    }

    async fn wait_until_idle(coordinator: &TurnCoordinator) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while coordinator.is_busy() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("turn did not settle");
    }

    // =========================================================================
    // Submit Tests
    // =========================================================================

    #[tokio::test]
    async fn test_submit_streams_full_reply() {
        let coordinator = coordinator(ScriptedClient::new(["Hel", "lo", "!"]));

        let handle = coordinator.submit("hi").unwrap();
        let outcome = handle.wait().await;

        assert!(outcome.is_success());
        let last = coordinator.last_message().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert_eq!(last.text, "Hello!");

        let snap = coordinator.snapshot();
        assert!(!snap.busy);
        assert_eq!(snap.partial, "");
    }

    #[tokio::test]
    async fn test_end_to_end_history_and_busy_window() {
        let coordinator = coordinator(ScriptedClient::new(["Hi ", "there"]));
        let before = coordinator.history().len();

        let handle = coordinator.submit("hi").unwrap();
        assert!(coordinator.snapshot().busy);

        handle.wait().await;

        let snap = coordinator.snapshot();
        assert!(!snap.busy);
        assert_eq!(snap.partial, "");

        let history = coordinator.history();
        assert_eq!(history.len(), before + 2);
        assert_eq!(history[before].role, MessageRole::User);
        assert_eq!(history[before].text, "hi");
        assert_eq!(history[before + 1].role, MessageRole::Assistant);
        assert_eq!(history[before + 1].text, "Hi there");
    }

    #[tokio::test]
    async fn test_error_after_partial_chunks() {
        let coordinator =
            coordinator(ScriptedClient::new(["Par", "tial"]).failing_after("model not found"));

        let outcome = coordinator.submit("hi").unwrap().wait().await;

        assert!(!outcome.is_success());
        let last = coordinator.last_message().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert!(last.text.starts_with("Error: "));
        assert!(!coordinator.is_busy());
        assert_eq!(
            coordinator.snapshot().last_error.as_deref(),
            Some("Error: model not found")
        );
    }

    #[tokio::test]
    async fn test_session_usable_after_failure() {
        let coordinator = coordinator(ScriptedClient::new(["x"]).failing_after("boom"));
        coordinator.submit("first").unwrap().wait().await;

        let second = coordinator.submit("second");
        assert!(second.is_ok());
        second.unwrap().wait().await;
        assert_eq!(coordinator.history().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_and_whitespace_rejected() {
        let coordinator = coordinator(ScriptedClient::new(["x"]));

        assert_eq!(coordinator.submit("").err(), Some(TurnError::EmptyMessage));
        assert_eq!(
            coordinator.submit("   \n\t").err(),
            Some(TurnError::EmptyMessage)
        );
        assert!(coordinator.history().is_empty());
        assert!(!coordinator.is_busy());
    }

    #[tokio::test]
    async fn test_submit_while_busy_is_rejected_without_side_effects() {
        let gate = Arc::new(Notify::new());
        let client = ScriptedClient::new(["ok"]).gated(gate.clone());
        let calls = client.call_counter();
        let coordinator = coordinator(client);

        let handle = coordinator.submit("first").unwrap();
        let history_before = coordinator.history();

        assert_eq!(
            coordinator.submit("second").err(),
            Some(TurnError::AlreadyBusy)
        );
        assert_eq!(coordinator.history(), history_before);

        gate.notify_one();
        handle.wait().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.history().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submits_admit_one_turn() {
        let gate = Arc::new(Notify::new());
        let client = ScriptedClient::new(["ok"]).gated(gate.clone());
        let calls = client.call_counter();
        let coordinator = Arc::new(coordinator(client));

        let attempts: Vec<_> = (0..16)
            .map(|i| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.submit(&format!("msg {}", i)).ok() })
            })
            .collect();

        let mut accepted = Vec::new();
        for attempt in attempts {
            if let Some(handle) = attempt.await.unwrap() {
                accepted.push(handle);
            }
        }
        assert_eq!(accepted.len(), 1);
        assert_eq!(coordinator.history().len(), 1);

        gate.notify_one();
        for handle in accepted {
            handle.wait().await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.history().len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_handle_still_commits() {
        let coordinator = coordinator(ScriptedClient::new(["still ", "here"]));

        drop(coordinator.submit("hi").unwrap());
        wait_until_idle(&coordinator).await;

        assert_eq!(coordinator.last_message().unwrap().text, "still here");
    }

    #[tokio::test]
    async fn test_panicked_turn_outcome_is_committed_entry() {
        let coordinator = coordinator(ScriptedClient::new(["a"]).panicking());

        let outcome = coordinator.submit("hi").unwrap().wait().await;

        assert!(!outcome.is_success());
        let last = coordinator.last_message().unwrap();
        assert_eq!(outcome.message(), &last);
        assert_eq!(last.text, format!("Error: {}", ABORTED_REASON));
        assert_eq!(coordinator.history().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_idle_snapshot_implies_reply_in_history() {
        let chunks: Vec<String> = (0..50).map(|i| format!("c{} ", i)).collect();
        let expected = chunks.concat();
        let coordinator = coordinator(ScriptedClient::new(chunks));

        let _handle = coordinator.submit("hi").unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = coordinator.snapshot();
                if !snapshot.busy {
                    break snapshot;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("turn did not settle");

        let last = coordinator.last_message().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert!(!last.is_error());
        assert_eq!(last.text, expected);
        assert_eq!(snapshot.partial, "");
    }

    #[tokio::test]
    async fn test_completion_flag_consumed_once() {
        let coordinator = coordinator(ScriptedClient::new(["done"]));
        coordinator.submit("hi").unwrap().wait().await;

        assert!(coordinator.snapshot().just_completed);
        assert!(coordinator.take_completion());
        assert!(!coordinator.take_completion());
    }

    // =========================================================================
    // Event Tests
    // =========================================================================

    #[tokio::test]
    async fn test_events_follow_turn_order() {
        let coordinator = coordinator(ScriptedClient::new(["Hel", "lo"]));
        let mut events = coordinator.subscribe();

        coordinator.submit("hi").unwrap();

        let mut chunks = Vec::new();
        match events.recv().await.unwrap() {
            TurnEvent::Started { text } => assert_eq!(text, "hi"),
            other => panic!("Expected Started, got {:?}", other),
        }
        loop {
            match events.recv().await.unwrap() {
                TurnEvent::Chunk { text } => chunks.push(text),
                TurnEvent::Completed { message } => {
                    // History is committed before the terminal event.
                    assert_eq!(coordinator.last_message().unwrap(), message);
                    break;
                }
                other => panic!("Unexpected event {:?}", other),
            }
        }
        assert_eq!(chunks, vec!["Hel", "lo"]);
    }

    // =========================================================================
    // Model Switch / Clear Tests
    // =========================================================================

    #[tokio::test]
    async fn test_switch_model_clears_history() {
        let coordinator = coordinator(ScriptedClient::new(["a"]).named("gemma2:2b"));
        coordinator.submit("hi").unwrap().wait().await;
        assert_eq!(coordinator.history().len(), 2);

        coordinator
            .switch_model(Arc::new(ScriptedClient::new(["b"]).named("llama2:7b")))
            .unwrap();

        assert!(coordinator.history().is_empty());
        assert_eq!(coordinator.model_name(), "llama2:7b");
    }

    #[tokio::test]
    async fn test_switch_model_refused_while_busy() {
        let gate = Arc::new(Notify::new());
        let coordinator = coordinator(ScriptedClient::new(["a"]).named("old").gated(gate.clone()));
        let handle = coordinator.submit("hi").unwrap();

        let result = coordinator.switch_model(Arc::new(ScriptedClient::new(["b"]).named("new")));

        assert_eq!(result, Err(TurnError::AlreadyBusy));
        assert_eq!(coordinator.model_name(), "old");
        assert_eq!(coordinator.history().len(), 1);

        gate.notify_one();
        handle.wait().await;
    }

    #[tokio::test]
    async fn test_clear_history_refused_while_busy() {
        let gate = Arc::new(Notify::new());
        let coordinator = coordinator(ScriptedClient::new(["a"]).gated(gate.clone()));
        let handle = coordinator.submit("hi").unwrap();

        assert_eq!(coordinator.clear_history(), Err(TurnError::AlreadyBusy));
        assert_eq!(coordinator.history().len(), 1);

        gate.notify_one();
        handle.wait().await;

        let mut events = coordinator.subscribe();
        coordinator.clear_history().unwrap();
        assert!(coordinator.history().is_empty());
        assert!(matches!(
            events.try_recv().unwrap(),
            Some(TurnEvent::HistoryCleared)
        ));
    }

    #[tokio::test]
    async fn test_worker_uses_client_active_at_submit() {
        let coordinator = coordinator(ScriptedClient::new(["first"]).named("one"));
        coordinator.submit("hi").unwrap().wait().await;
        coordinator
            .switch_model(Arc::new(ScriptedClient::new(["second"]).named("two")))
            .unwrap();

        coordinator.submit("hi").unwrap().wait().await;
        assert_eq!(coordinator.last_message().unwrap().text, "second");
    }
}
