//! Map a finalized voice transcript to a cooking command.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static ADVANCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)next step|what['\u{2019}]s next|done|i['\u{2019}]ve done that").unwrap()
});

static REPEAT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)repeat").unwrap());

static TIMER_TRIGGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)set a timer for").unwrap());

static TIMER_QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)timer for (\d+) (minutes|minute|seconds|second)").unwrap()
});

/// What the cook asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CommandIntent {
    Advance,
    Repeat,
    /// Duration in seconds
    SetTimer(u32),
    /// The raw transcript, echoed back in a clarification
    Unrecognized(String),
}

/// Interpret a transcript. Rules are checked in order and the first match wins.
///
/// Returns `None` for a blank transcript.
pub fn interpret(transcript: &str) -> Option<CommandIntent> {
    let text = transcript.trim();
    if text.is_empty() {
        return None;
    }

    if ADVANCE_RE.is_match(text) {
        return Some(CommandIntent::Advance);
    }
    if REPEAT_RE.is_match(text) {
        return Some(CommandIntent::Repeat);
    }
    if TIMER_TRIGGER_RE.is_match(text) {
        if let Some(seconds) = timer_seconds(text) {
            return Some(CommandIntent::SetTimer(seconds));
        }
        tracing::debug!(transcript = text, "timer request without a usable quantity");
    }

    Some(CommandIntent::Unrecognized(text.to_string()))
}

fn timer_seconds(text: &str) -> Option<u32> {
    let caps = TIMER_QUANTITY_RE.captures(text)?;
    let amount: u32 = caps[1].parse().ok()?;
    if caps[2].to_ascii_lowercase().starts_with("minute") {
        amount.checked_mul(60)
    } else {
        Some(amount)
    }
}

/// What to say back when a transcript matched no command.
pub fn clarification_prompt(heard: &str) -> String {
    format!(
        "I heard: {}. You can say \"next step\", \"repeat\", or \"set a timer for 5 minutes\".",
        heard
    )
}
