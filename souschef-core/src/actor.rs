//! The live cooking session.
//!
//! One tokio task owns the [`Session`]. Voice transcripts, UI actions and the
//! periodic timer tick all reach it as messages on the same channel, so
//! transitions are applied strictly in arrival order. Handles talk to it over
//! `mpsc` with `oneshot` replies; observers subscribe to a broadcast of
//! [`SessionEvent`]s. Snapshots are handed to a separate writer task and saved
//! without blocking the session.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::command::{clarification_prompt, interpret, CommandIntent};
use crate::error::{ActorError, ValidationError};
use crate::session::Session;
use crate::store::SessionStore;
use crate::timer::{Timer, TimerEngine, TimerView, DEFAULT_GRACE_MS};
use crate::types::Recipe;
use crate::voice::announcement;

const COMMAND_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Period of the timer tick
    pub tick: Duration,
    /// How long an expired timer is kept before it is dropped
    pub grace_ms: i64,
    pub event_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            grace_ms: DEFAULT_GRACE_MS,
            event_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepDirection {
    Forward,
    Backward,
    Jump,
}

/// Something observers of a live session may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    RecipeLoaded {
        title: String,
        first_step: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    StepChanged {
        index: usize,
        step: String,
        direction: StepDirection,
    },
    StepRepeated { index: usize, step: String },
    TimerSet { timer: Timer },
    TimerExpired { timer: Timer },
    TimersTicked { timers: Vec<TimerView> },
    ClarificationNeeded { heard: String, prompt: String },
    PersistenceFailed { message: String },
}

/// Result of feeding one transcript to the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptOutcome {
    /// `None` for a blank transcript
    pub intent: Option<CommandIntent>,
    /// What to say back, if anything
    pub response: Option<String>,
    pub session: Session,
}

type Reply<T> = oneshot::Sender<Result<T, ActorError>>;

enum Command {
    Snapshot(oneshot::Sender<Session>),
    Timers(oneshot::Sender<Vec<TimerView>>),
    Advance(Reply<Session>),
    GoBack(Reply<Session>),
    GoTo(i64, Reply<Session>),
    Repeat(Reply<Session>),
    SetTimer {
        duration_seconds: i64,
        label: Option<String>,
        reply: Reply<(Session, Timer)>,
    },
    LoadRecipe(Recipe, Reply<Session>),
    Transcript(String, Reply<TranscriptOutcome>),
    Shutdown,
}

/// Cloneable handle to a running [`SessionActor`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ActorError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| ActorError::Stopped)?;
        rx.await.map_err(|_| ActorError::Stopped)
    }

    pub async fn snapshot(&self) -> Result<Session, ActorError> {
        self.request(Command::Snapshot).await
    }

    /// Every active timer, projected at the current instant.
    pub async fn timers(&self) -> Result<Vec<TimerView>, ActorError> {
        self.request(Command::Timers).await
    }

    pub async fn advance(&self) -> Result<Session, ActorError> {
        self.request(Command::Advance).await?
    }

    pub async fn go_back(&self) -> Result<Session, ActorError> {
        self.request(Command::GoBack).await?
    }

    pub async fn go_to(&self, index: i64) -> Result<Session, ActorError> {
        self.request(|reply| Command::GoTo(index, reply)).await?
    }

    pub async fn repeat(&self) -> Result<Session, ActorError> {
        self.request(Command::Repeat).await?
    }

    pub async fn set_timer(
        &self,
        duration_seconds: i64,
        label: Option<String>,
    ) -> Result<(Session, Timer), ActorError> {
        self.request(|reply| Command::SetTimer {
            duration_seconds,
            label,
            reply,
        })
        .await?
    }

    /// Replace the recipe; the session restarts at step 0 with no timers.
    pub async fn load_recipe(&self, recipe: Recipe) -> Result<Session, ActorError> {
        self.request(|reply| Command::LoadRecipe(recipe, reply)).await?
    }

    /// Interpret a finalized voice transcript and apply the resulting command.
    pub async fn transcript(
        &self,
        text: impl Into<String>,
    ) -> Result<TranscriptOutcome, ActorError> {
        let text = text.into();
        self.request(|reply| Command::Transcript(text, reply)).await?
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Ask the actor to stop. Await the join handle from [`SessionActor::spawn`]
    /// to wait for the final snapshot to be written.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

pub struct SessionActor {
    session: Session,
    engine: TimerEngine,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<SessionEvent>,
    persist: Option<watch::Sender<Option<Session>>>,
}

impl SessionActor {
    /// Start a session task. The saved snapshot, if any, is restored before the
    /// first command is handled.
    pub fn spawn(
        store: Option<Arc<dyn SessionStore>>,
        clock: Arc<dyn Clock>,
        config: ActorConfig,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        let handle = SessionHandle {
            commands: command_tx,
            events: event_tx.clone(),
        };

        let join = tokio::spawn(async move {
            let session = match &store {
                Some(store) => restore(store.as_ref()).await,
                None => Session::default(),
            };

            let (persist, writer) = match store {
                Some(store) => {
                    let (tx, rx) = watch::channel(None);
                    let writer = tokio::spawn(write_snapshots(store, rx, event_tx.clone()));
                    (Some(tx), Some(writer))
                }
                None => (None, None),
            };

            let actor = SessionActor {
                session,
                engine: TimerEngine::new(config.grace_ms),
                clock,
                events: event_tx,
                persist,
            };
            actor.run(command_rx, config.tick).await;

            if let Some(writer) = writer {
                if let Err(e) = writer.await {
                    tracing::warn!(error = %e, "session writer task failed");
                }
            }
        });

        (handle, join)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>, tick: Duration) {
        let mut interval = tokio::time::interval(tick.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            step = self.session.current_step_index,
            timers = self.session.active_timers.len(),
            "session actor started"
        );

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                _ = interval.tick() => self.tick(),
            }
        }

        tracing::info!("session actor stopped");
        // Dropping the sender lets the writer flush the last snapshot and exit
        self.persist = None;
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Snapshot(reply) => {
                let _ = reply.send(self.session.clone());
            }
            Command::Timers(reply) => {
                let now = self.clock.now_ms();
                let views = self
                    .session
                    .active_timers
                    .iter()
                    .map(|t| TimerView::at(t, now))
                    .collect();
                let _ = reply.send(views);
            }
            Command::Advance(reply) => {
                let result = self.advance();
                self.reply_session(reply, result);
            }
            Command::GoBack(reply) => {
                let result = self.go_back();
                self.reply_session(reply, result);
            }
            Command::GoTo(index, reply) => {
                let result = self.go_to(index);
                self.reply_session(reply, result);
            }
            Command::Repeat(reply) => {
                let result = self.repeat();
                self.reply_session(reply, result);
            }
            Command::SetTimer {
                duration_seconds,
                label,
                reply,
            } => {
                let result = self
                    .set_timer(duration_seconds, label.as_deref())
                    .map(|(_, timer)| (self.session.clone(), timer))
                    .map_err(ActorError::from);
                let _ = reply.send(result);
            }
            Command::LoadRecipe(recipe, reply) => {
                self.load_recipe(recipe);
                let _ = reply.send(Ok(self.session.clone()));
            }
            Command::Transcript(text, reply) => {
                let _ = reply.send(self.transcript(&text));
            }
            Command::Shutdown => {}
        }
    }

    /// Apply a transition, save and broadcast. Returns the events emitted.
    fn commit(&mut self, next: Session, events: Vec<SessionEvent>) -> Vec<SessionEvent> {
        if next != self.session {
            self.session = next;
            self.save();
        }
        for event in &events {
            // No subscribers is fine
            let _ = self.events.send(event.clone());
        }
        events
    }

    fn save(&self) {
        if let Some(persist) = &self.persist {
            persist.send_replace(Some(self.session.clone()));
        }
    }

    fn reply_session(
        &self,
        reply: Reply<Session>,
        result: Result<Vec<SessionEvent>, ValidationError>,
    ) {
        let _ = reply.send(
            result
                .map(|_| self.session.clone())
                .map_err(ActorError::from),
        );
    }

    fn advance(&mut self) -> Result<Vec<SessionEvent>, ValidationError> {
        let total = self.session.require_recipe()?.total_steps();
        let before = self.session.current_step_index;
        let next = self.session.advance(total);

        let mut events = Vec::new();
        if next.current_step_index != before {
            events.push(SessionEvent::StepChanged {
                index: next.current_step_index,
                step: next.current_step()?.to_string(),
                direction: StepDirection::Forward,
            });
        }
        Ok(self.commit(next, events))
    }

    fn go_back(&mut self) -> Result<Vec<SessionEvent>, ValidationError> {
        self.session.require_recipe()?;
        let before = self.session.current_step_index;
        let next = self.session.go_back();

        let mut events = Vec::new();
        if next.current_step_index != before {
            events.push(SessionEvent::StepChanged {
                index: next.current_step_index,
                step: next.current_step()?.to_string(),
                direction: StepDirection::Backward,
            });
        }
        Ok(self.commit(next, events))
    }

    fn go_to(&mut self, index: i64) -> Result<Vec<SessionEvent>, ValidationError> {
        let total = self.session.require_recipe()?.total_steps();
        let next = self.session.go_to(index, total)?;
        let event = SessionEvent::StepChanged {
            index: next.current_step_index,
            step: next.current_step()?.to_string(),
            direction: StepDirection::Jump,
        };
        Ok(self.commit(next, vec![event]))
    }

    fn repeat(&mut self) -> Result<Vec<SessionEvent>, ValidationError> {
        let step = self.session.current_step()?.to_string();
        let next = self.session.repeat();
        let event = SessionEvent::StepRepeated {
            index: next.current_step_index,
            step,
        };
        Ok(self.commit(next, vec![event]))
    }

    fn set_timer(
        &mut self,
        duration_seconds: i64,
        label: Option<&str>,
    ) -> Result<(Vec<SessionEvent>, Timer), ValidationError> {
        let (next, timer) = self
            .session
            .set_timer(duration_seconds, label, self.clock.now_ms())?;
        tracing::debug!(id = %timer.id, seconds = timer.duration_seconds, "timer set");
        let events = self.commit(
            next,
            vec![SessionEvent::TimerSet {
                timer: timer.clone(),
            }],
        );
        Ok((events, timer))
    }

    fn load_recipe(&mut self, recipe: Recipe) -> Vec<SessionEvent> {
        tracing::info!(title = %recipe.title, steps = recipe.total_steps(), "recipe loaded");
        self.engine.reset();
        let event = SessionEvent::RecipeLoaded {
            title: recipe.title.clone(),
            first_step: recipe.step(0).map(str::to_string),
        };
        let next = self.session.with_recipe(recipe);
        self.commit(next, vec![event])
    }

    fn transcript(&mut self, text: &str) -> Result<TranscriptOutcome, ActorError> {
        let intent = interpret(text);
        tracing::debug!(transcript = text, ?intent, "transcript interpreted");

        let events = match &intent {
            None => Vec::new(),
            Some(CommandIntent::Advance) => self.advance()?,
            Some(CommandIntent::Repeat) => self.repeat()?,
            Some(CommandIntent::SetTimer(seconds)) => {
                self.set_timer(i64::from(*seconds), None)?.0
            }
            Some(CommandIntent::Unrecognized(heard)) => self.commit(
                self.session.clone(),
                vec![SessionEvent::ClarificationNeeded {
                    heard: heard.clone(),
                    prompt: clarification_prompt(heard),
                }],
            ),
        };

        Ok(TranscriptOutcome {
            intent,
            response: events.iter().find_map(announcement),
            session: self.session.clone(),
        })
    }

    fn tick(&mut self) {
        let now = self.clock.now_ms();
        let tick = self.engine.tick(now, &self.session.active_timers);
        if tick.views.is_empty() {
            return;
        }

        let mut events = vec![SessionEvent::TimersTicked { timers: tick.views }];
        for timer in tick.expired {
            tracing::info!(id = %timer.id, label = %timer.label, "timer expired");
            events.push(SessionEvent::TimerExpired { timer });
        }

        let next = if tick.retired.is_empty() {
            self.session.clone()
        } else {
            self.session.remove_timers(&tick.retired)
        };
        self.commit(next, events);
    }
}

/// Load the saved snapshot, falling back to an empty session on any problem.
async fn restore(store: &dyn SessionStore) -> Session {
    let patch = match store.load().await {
        Ok(Some(patch)) => patch,
        Ok(None) => return Session::default(),
        Err(e) => {
            tracing::warn!(store = %store.describe(), error = %e, "failed to load saved session");
            return Session::default();
        }
    };

    match Session::restore(patch) {
        Ok(session) => {
            tracing::info!(store = %store.describe(), step = session.current_step_index, "restored saved session");
            session
        }
        Err(e) => {
            tracing::warn!(store = %store.describe(), error = %e, "saved session rejected");
            Session::default()
        }
    }
}

/// Save each new snapshot in order, skipping ones superseded while a write was in flight.
async fn write_snapshots(
    store: Arc<dyn SessionStore>,
    mut snapshots: watch::Receiver<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
) {
    while snapshots.changed().await.is_ok() {
        let Some(session) = snapshots.borrow_and_update().clone() else {
            continue;
        };
        if let Err(e) = store.save(&session).await {
            tracing::warn!(store = %store.describe(), error = %e, "failed to save session");
            let _ = events.send(SessionEvent::PersistenceFailed {
                message: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::PersistenceError;
    use crate::session::SessionPatch;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    const NOW: i64 = 1_700_000_000_000;

    fn recipe() -> Recipe {
        Recipe {
            title: "Pancakes".to_string(),
            ingredients: vec!["flour".to_string(), "milk".to_string()],
            steps: vec![
                "Whisk the batter.".to_string(),
                "Heat the pan.".to_string(),
                "Cook each side.".to_string(),
            ],
        }
    }

    fn spawn(
        store: Option<Arc<dyn SessionStore>>,
    ) -> (SessionHandle, JoinHandle<()>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NOW));
        let (handle, join) = SessionActor::spawn(store, clock.clone(), ActorConfig::default());
        (handle, join, clock)
    }

    struct FailingStore;

    #[async_trait]
    impl SessionStore for FailingStore {
        async fn load(&self) -> Result<Option<SessionPatch>, PersistenceError> {
            Ok(None)
        }

        async fn save(&self, _session: &Session) -> Result<(), PersistenceError> {
            Err(PersistenceError::Status(503))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_and_bounds() {
        let (handle, _join, _clock) = spawn(None);
        assert_eq!(
            handle.advance().await,
            Err(ActorError::Rejected(ValidationError::MissingRecipe))
        );

        handle.load_recipe(recipe()).await.unwrap();
        for expected in [1, 2, 2] {
            assert_eq!(handle.advance().await.unwrap().current_step_index, expected);
        }
        for expected in [1, 0, 0] {
            assert_eq!(handle.go_back().await.unwrap().current_step_index, expected);
        }
        assert_eq!(handle.go_to(2).await.unwrap().current_step_index, 2);
        assert!(handle.go_to(3).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transcripts_drive_the_session() {
        let (handle, _join, _clock) = spawn(None);
        handle.load_recipe(recipe()).await.unwrap();

        let outcome = handle.transcript("what's next").await.unwrap();
        assert_eq!(outcome.intent, Some(CommandIntent::Advance));
        assert_eq!(outcome.response.as_deref(), Some("Next step: Heat the pan."));
        assert_eq!(outcome.session.current_step_index, 1);

        let outcome = handle.transcript("please repeat that").await.unwrap();
        assert_eq!(outcome.response.as_deref(), Some("Repeating: Heat the pan."));
        assert_eq!(outcome.session.last_confirmed_step, Some(1));

        let outcome = handle.transcript("set a timer for 5 minutes").await.unwrap();
        assert_eq!(outcome.response.as_deref(), Some("Timer set for 5 minutes."));
        assert_eq!(outcome.session.active_timers.len(), 1);
        assert_eq!(outcome.session.active_timers[0].end_time_ms, NOW + 300_000);

        let outcome = handle.transcript("turn off the oven").await.unwrap();
        assert_eq!(
            outcome.response,
            Some(clarification_prompt("turn off the oven"))
        );

        let outcome = handle.transcript("  ").await.unwrap();
        assert_eq!(outcome.intent, None);
        assert_eq!(outcome.response, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_second_timer_is_rejected() {
        let (handle, _join, _clock) = spawn(None);
        let err = handle.transcript("set a timer for 0 seconds").await.unwrap_err();
        assert_eq!(
            err,
            ActorError::Rejected(ValidationError::NonPositiveDuration)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_longest_timer_keeps_session_alive() {
        let (handle, _join, _clock) = spawn(None);
        let (_, timer) = handle.set_timer(i64::from(u32::MAX), None).await.unwrap();
        assert_eq!(timer.label, "Timer (71582788 min)");

        handle.load_recipe(recipe()).await.unwrap();
        let outcome = handle
            .transcript("set a timer for 71582788 minutes")
            .await
            .unwrap();
        assert_eq!(
            outcome.response.as_deref(),
            Some("Timer set for 71582788 minutes.")
        );
        assert_eq!(handle.snapshot().await.unwrap().active_timers.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_timer_with_bad_end_time_is_not_restored() {
        let store = Arc::new(MemoryStore::new());
        let (mut saved, _) = Session::for_recipe(recipe()).set_timer(60, None, NOW).unwrap();
        saved.active_timers[0].end_time_ms = i64::MIN;
        store.save(&saved).await.unwrap();

        let (handle, _join, _clock) = spawn(Some(store));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(handle.snapshot().await.unwrap(), Session::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_expires_once_then_retires() {
        let (handle, _join, clock) = spawn(None);
        let mut events = handle.subscribe();
        let (_, timer) = handle.set_timer(2, None).await.unwrap();

        // Sleep past each tick boundary so the tick has run before the clock moves
        clock.advance(2_000);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        clock.advance(1_000);
        tokio::time::sleep(Duration::from_millis(1_000)).await;

        let mut expired = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::TimerExpired { timer } = event {
                expired.push(timer.id);
            }
        }
        assert_eq!(expired, vec![timer.id]);
        assert!(handle.snapshot().await.unwrap().active_timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_recipe_clears_timers() {
        let (handle, _join, _clock) = spawn(None);
        handle.load_recipe(recipe()).await.unwrap();
        handle.advance().await.unwrap();
        handle.set_timer(60, Some("Rest".to_string())).await.unwrap();

        let session = handle.load_recipe(recipe()).await.unwrap();
        assert_eq!(session.current_step_index, 0);
        assert_eq!(session.last_confirmed_step, None);
        assert!(session.active_timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restores_and_persists() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(&Session::for_recipe(recipe()).advance(3))
            .await
            .unwrap();

        let (handle, join, _clock) = spawn(Some(store.clone()));
        assert_eq!(handle.snapshot().await.unwrap().current_step_index, 1);

        handle.advance().await.unwrap();
        handle.shutdown().await;
        join.await.unwrap();

        let saved = Session::restore(store.load().await.unwrap().unwrap()).unwrap();
        assert_eq!(saved.current_step_index, 2);
        assert_eq!(handle.snapshot().await, Err(ActorError::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_is_reported_not_fatal() {
        let (handle, _join, _clock) = spawn(Some(Arc::new(FailingStore)));
        let mut events = handle.subscribe();

        let session = handle.load_recipe(recipe()).await.unwrap();
        assert_eq!(session.total_steps(), 3);

        loop {
            match events.recv().await.unwrap() {
                SessionEvent::PersistenceFailed { message } => {
                    assert!(message.contains("503"));
                    break;
                }
                _ => continue,
            }
        }
        assert_eq!(handle.snapshot().await.unwrap().total_steps(), 3);
    }
}
