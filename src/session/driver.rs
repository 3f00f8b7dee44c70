//! Tokio host for a study session
//!
//! One task owns the engine. User commands and timer firings arrive on the
//! same channel and are handled one at a time; timer effects become
//! `tokio::time::sleep` tasks and review effects go to a [`ReviewSink`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::engine::{Effect, SessionCommand, SessionEngine};
use super::timers::{TimerHandle, TimerKind};
use super::view::SessionView;
use crate::flashcards::{FlashcardStorage, FlashcardStorageError, ReviewOutcome};

/// Where review log entries produced by a session are written
pub trait ReviewSink: Send + 'static {
    fn log_review(
        &self,
        card_id: i64,
        outcome: ReviewOutcome,
        duration_ms: u64,
    ) -> Result<(), FlashcardStorageError>;
}

impl ReviewSink for Arc<Mutex<FlashcardStorage>> {
    fn log_review(
        &self,
        card_id: i64,
        outcome: ReviewOutcome,
        duration_ms: u64,
    ) -> Result<(), FlashcardStorageError> {
        let storage = self
            .lock()
            .map_err(|_| FlashcardStorageError::Invalid("storage lock poisoned".to_string()))?;
        storage.log_review(card_id, outcome, duration_ms)?;
        Ok(())
    }
}

#[derive(Error, Debug)]
#[error("Study session has ended")]
pub struct SessionClosed;

enum DriverEvent {
    Command(SessionCommand, oneshot::Sender<SessionView>),
    TimerFired(TimerKind, TimerHandle),
}

/// Cloneable handle for sending commands to a running session
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<DriverEvent>,
    views: watch::Receiver<SessionView>,
}

impl SessionHandle {
    /// Run a command and wait for the view it produced
    pub async fn dispatch(&self, command: SessionCommand) -> Result<SessionView, SessionClosed> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(DriverEvent::Command(command, reply))
            .await
            .map_err(|_| SessionClosed)?;
        response.await.map_err(|_| SessionClosed)
    }

    /// Latest published view, including changes made by timers
    pub fn current_view(&self) -> SessionView {
        self.views.borrow().clone()
    }

    /// Receiver that is notified whenever the view changes
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.views.clone()
    }
}

pub struct SessionDriver<S: ReviewSink> {
    engine: SessionEngine,
    sink: S,
    events: mpsc::Receiver<DriverEvent>,
    timer_events: mpsc::WeakSender<DriverEvent>,
    views: watch::Sender<SessionView>,
    running: HashMap<TimerHandle, JoinHandle<()>>,
}

impl<S: ReviewSink> SessionDriver<S> {
    /// Start the session loop. It stops once every [`SessionHandle`] is dropped.
    pub fn spawn(engine: SessionEngine, sink: S) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(32);
        let (views_tx, views_rx) = watch::channel(engine.view());

        let driver = Self {
            engine,
            sink,
            events: rx,
            timer_events: tx.downgrade(),
            views: views_tx,
            running: HashMap::new(),
        };
        let task = tokio::spawn(driver.run());

        (
            SessionHandle {
                events: tx,
                views: views_rx,
            },
            task,
        )
    }

    async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            match event {
                DriverEvent::Command(command, reply) => {
                    let effects = self.engine.apply(command);
                    self.perform(effects);
                    let view = self.publish();
                    let _ = reply.send(view);
                }
                DriverEvent::TimerFired(kind, handle) => {
                    self.running.remove(&handle);
                    let effects = self.engine.timer_fired(kind, handle);
                    self.perform(effects);
                    self.publish();
                }
            }
        }

        for (_, task) in self.running.drain() {
            task.abort();
        }
        log::debug!("Study session loop finished");
    }

    fn publish(&self) -> SessionView {
        let view = self.engine.view();
        self.views.send_replace(view.clone());
        view
    }

    fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartTimer {
                    kind,
                    handle,
                    after,
                } => {
                    let events = self.timer_events.clone();
                    let task = tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        if let Some(events) = events.upgrade() {
                            let _ = events.send(DriverEvent::TimerFired(kind, handle)).await;
                        }
                    });
                    self.running.insert(handle, task);
                }
                Effect::CancelTimer { handle, .. } => {
                    if let Some(task) = self.running.remove(&handle) {
                        task.abort();
                    }
                }
                Effect::LogReview {
                    card_id,
                    outcome,
                    duration_ms,
                } => {
                    if let Err(e) = self.sink.log_review(card_id, outcome, duration_ms) {
                        log::error!("Failed to record review for card {}: {}", card_id, e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::Card;
    use crate::session::state::{Direction, TimerConfig};
    use crate::session::view::Banner;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<(i64, ReviewOutcome)>>>);

    impl ReviewSink for RecordingSink {
        fn log_review(
            &self,
            card_id: i64,
            outcome: ReviewOutcome,
            _duration_ms: u64,
        ) -> Result<(), FlashcardStorageError> {
            self.0.lock().unwrap().push((card_id, outcome));
            Ok(())
        }
    }

    fn cards() -> Vec<Card> {
        vec![Card::basic(1, "A", "a"), Card::basic(2, "B", "b")]
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_timer_times_out_card() {
        let config = TimerConfig {
            timer_enabled: true,
            reveal_timeout_ms: 10_000,
            ..Default::default()
        };
        let sink = RecordingSink::default();
        let (handle, _task) = SessionDriver::spawn(SessionEngine::seeded(config, 1), sink.clone());

        let view = handle
            .dispatch(SessionCommand::Load { cards: cards() })
            .await
            .unwrap();
        assert!(view.reveal_pending);

        tokio::time::sleep(Duration::from_millis(10_500)).await;

        let card = handle.current_view().card.unwrap();
        assert_eq!(card.banner, Some(Banner::TimesUp));
        assert_eq!(card.back.as_deref(), Some("a"));
        assert_eq!(*sink.0.lock().unwrap(), vec![(1, ReviewOutcome::Timeout)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_advance_moves_to_next_card() {
        let config = TimerConfig {
            auto_advance_enabled: true,
            auto_advance_delay_ms: 5_000,
            ..Default::default()
        };
        let (handle, _task) =
            SessionDriver::spawn(SessionEngine::seeded(config, 1), RecordingSink::default());

        handle
            .dispatch(SessionCommand::Load { cards: cards() })
            .await
            .unwrap();
        let view = handle.dispatch(SessionCommand::Flip).await.unwrap();
        assert!(view.auto_advance_pending);

        tokio::time::sleep(Duration::from_secs(6)).await;

        let view = handle.current_view();
        assert_eq!(view.position, "2 / 2");
        assert_eq!(view.card.unwrap().back, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_cancels_pending_reveal() {
        let config = TimerConfig {
            timer_enabled: true,
            reveal_timeout_ms: 1_000,
            ..Default::default()
        };
        let sink = RecordingSink::default();
        let (handle, _task) = SessionDriver::spawn(SessionEngine::seeded(config, 1), sink.clone());

        handle
            .dispatch(SessionCommand::Load { cards: cards() })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        handle
            .dispatch(SessionCommand::Advance {
                direction: Direction::Next,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        // Only the second card's countdown is live, and it has not run out yet
        assert!(sink.0.lock().unwrap().is_empty());
        assert!(handle.current_view().reveal_pending);
    }

    #[tokio::test]
    async fn test_loop_stops_when_handles_dropped() {
        let (handle, task) = SessionDriver::spawn(
            SessionEngine::seeded(TimerConfig::default(), 1),
            RecordingSink::default(),
        );
        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_storage_sink_persists_reviews() {
        let storage = Arc::new(Mutex::new(FlashcardStorage::open_in_memory().unwrap()));
        let card = storage
            .lock()
            .unwrap()
            .create_card(&crate::flashcards::NewCard {
                front: "Q".into(),
                back: "A".into(),
                ..Default::default()
            })
            .unwrap();

        let (handle, _task) = SessionDriver::spawn(
            SessionEngine::seeded(TimerConfig::default(), 1),
            Arc::clone(&storage),
        );
        handle
            .dispatch(SessionCommand::Load { cards: vec![card.clone()] })
            .await
            .unwrap();
        handle.dispatch(SessionCommand::Flip).await.unwrap();

        let reviews = storage.lock().unwrap().list_reviews(Some(card.id)).unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].outcome, ReviewOutcome::Revealed);
    }
}
