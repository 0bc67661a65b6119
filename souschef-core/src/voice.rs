//! Spoken responses for session events.
//!
//! Speech synthesis itself is a collaborator behind [`SpeechSink`]; this module
//! only decides what to say.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::actor::{SessionEvent, StepDirection};
use crate::timer::rounded_minutes;

#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, text: &str);
}

/// Writes utterances to the log instead of a speaker.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeaker;

#[async_trait]
impl SpeechSink for LogSpeaker {
    async fn speak(&self, text: &str) {
        tracing::info!(text, "speak");
    }
}

/// The sentence to speak for `event`, if it warrants one.
pub fn announcement(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::RecipeLoaded {
            first_step: Some(step),
            ..
        } => Some(format!("Great. Let's start with preparation: {}", step)),
        SessionEvent::StepChanged {
            index,
            step,
            direction,
        } => Some(match direction {
            StepDirection::Forward => format!("Next step: {}", step),
            StepDirection::Backward => format!("Going back: {}", step),
            StepDirection::Jump => format!("Step {}: {}", index + 1, step),
        }),
        SessionEvent::StepRepeated { step, .. } => Some(format!("Repeating: {}", step)),
        SessionEvent::TimerSet { timer } => Some(format!(
            "Timer set for {} minutes.",
            rounded_minutes(timer.duration_seconds)
        )),
        SessionEvent::TimerExpired { timer } => Some(format!("{} is done.", timer.label)),
        SessionEvent::ClarificationNeeded { prompt, .. } => Some(prompt.clone()),
        SessionEvent::RecipeLoaded { .. }
        | SessionEvent::TimersTicked { .. }
        | SessionEvent::PersistenceFailed { .. } => None,
    }
}

/// Speak every announcement from `events` until the session goes away.
pub fn spawn_narrator(
    mut events: broadcast::Receiver<SessionEvent>,
    sink: Arc<dyn SpeechSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(text) = announcement(&event) {
                        sink.speak(&text).await;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "narrator fell behind; announcements dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::create_timer;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        spoken: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechSink for Recorder {
        async fn speak(&self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
        }
    }

    #[test]
    fn test_announcements() {
        let step = |direction| SessionEvent::StepChanged {
            index: 2,
            step: "Stir.".to_string(),
            direction,
        };
        assert_eq!(
            announcement(&step(StepDirection::Forward)).as_deref(),
            Some("Next step: Stir.")
        );
        assert_eq!(
            announcement(&step(StepDirection::Jump)).as_deref(),
            Some("Step 3: Stir.")
        );

        let loaded = SessionEvent::RecipeLoaded {
            title: "Soup".to_string(),
            first_step: Some("Chop onions.".to_string()),
        };
        assert_eq!(
            announcement(&loaded).as_deref(),
            Some("Great. Let's start with preparation: Chop onions.")
        );

        let timer = create_timer(90, None, 0).unwrap();
        assert_eq!(
            announcement(&SessionEvent::TimerSet { timer }).as_deref(),
            Some("Timer set for 2 minutes.")
        );

        let ticked = SessionEvent::TimersTicked { timers: vec![] };
        assert_eq!(announcement(&ticked), None);
    }

    #[tokio::test]
    async fn test_narrator_speaks_until_closed() {
        let (tx, rx) = broadcast::channel(8);
        let recorder = Arc::new(Recorder::default());
        let narrator = spawn_narrator(rx, recorder.clone());

        tx.send(SessionEvent::StepRepeated {
            index: 0,
            step: "Whisk.".to_string(),
        })
        .unwrap();
        tx.send(SessionEvent::PersistenceFailed {
            message: "down".to_string(),
        })
        .unwrap();
        drop(tx);
        narrator.await.unwrap();

        assert_eq!(*recorder.spoken.lock().unwrap(), vec!["Repeating: Whisk."]);
    }
}
