//! Cooking session state and its pure transition functions.
//!
//! Every transition takes the current [`Session`] by reference and returns the
//! next one. Nothing here performs I/O; persistence and scheduling live in
//! [`crate::actor`].

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::timer::{create_timer, Timer};
use crate::types::Recipe;

/// Where the cook is in a recipe, plus any running timers.
///
/// `current_step_index` stays within `[0, steps - 1]` of the embedded recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub current_step_index: usize,
    #[serde(default)]
    pub last_confirmed_step: Option<usize>,
    /// Insertion order is display order
    #[serde(default)]
    pub active_timers: Vec<Timer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Recipe>,
}

impl Session {
    /// A fresh session positioned at the first step of `recipe`.
    pub fn for_recipe(recipe: Recipe) -> Self {
        Self {
            recipe: Some(recipe),
            ..Self::default()
        }
    }

    /// Rebuild a session from a saved snapshot, over the defaults.
    pub fn restore(patch: SessionPatch) -> Result<Self, ValidationError> {
        Self::default().merge(patch)
    }

    /// Step count of the embedded recipe, zero when there is none.
    pub fn total_steps(&self) -> usize {
        self.recipe.as_ref().map_or(0, Recipe::total_steps)
    }

    /// The embedded recipe, which must have at least one step.
    pub fn require_recipe(&self) -> Result<&Recipe, ValidationError> {
        let recipe = self.recipe.as_ref().ok_or(ValidationError::MissingRecipe)?;
        if recipe.steps.is_empty() {
            return Err(ValidationError::NoSteps);
        }
        Ok(recipe)
    }

    /// Every active timer must have a positive duration and a plausible end time.
    pub fn validate_timers(&self) -> Result<(), ValidationError> {
        self.active_timers.iter().try_for_each(Timer::validate)
    }

    pub fn current_step(&self) -> Result<&str, ValidationError> {
        self.require_recipe()?
            .step(self.current_step_index)
            .ok_or(ValidationError::InvalidStepIndex)
    }

    /// Move one step forward, stopping at the last step.
    pub fn advance(&self, total_steps: usize) -> Self {
        let Some(last) = total_steps.checked_sub(1) else {
            return self.clone();
        };
        let next = (self.current_step_index + 1).min(last);
        Self {
            current_step_index: next,
            last_confirmed_step: Some(next),
            ..self.clone()
        }
    }

    /// Like [`Session::advance`], but rejects a session already on its last step.
    pub fn advance_checked(&self) -> Result<Self, ValidationError> {
        let total = self.require_recipe()?.total_steps();
        if self.current_step_index >= total {
            return Err(ValidationError::InvalidStepIndex);
        }
        if self.current_step_index == total - 1 {
            return Err(ValidationError::AlreadyAtLastStep);
        }
        Ok(self.advance(total))
    }

    /// Move one step back, stopping at the first step.
    pub fn go_back(&self) -> Self {
        let prev = self.current_step_index.saturating_sub(1);
        Self {
            current_step_index: prev,
            last_confirmed_step: Some(prev),
            ..self.clone()
        }
    }

    /// Jump straight to `index`, which must name an existing step.
    pub fn go_to(&self, index: i64, total_steps: usize) -> Result<Self, ValidationError> {
        let target = usize::try_from(index)
            .ok()
            .filter(|i| *i < total_steps)
            .ok_or(ValidationError::StepOutOfRange {
                received: index,
                max: total_steps.saturating_sub(1),
            })?;
        Ok(Self {
            current_step_index: target,
            last_confirmed_step: Some(target),
            ..self.clone()
        })
    }

    /// Mark the current step for re-announcement without moving.
    pub fn repeat(&self) -> Self {
        Self {
            last_confirmed_step: Some(self.current_step_index),
            ..self.clone()
        }
    }

    /// Append a new timer; returns the new session and the timer created.
    pub fn set_timer(
        &self,
        duration_seconds: i64,
        label: Option<&str>,
        now_ms: i64,
    ) -> Result<(Self, Timer), ValidationError> {
        let timer = create_timer(duration_seconds, label, now_ms)?;
        let mut next = self.clone();
        next.active_timers.push(timer.clone());
        Ok((next, timer))
    }

    pub fn remove_timers(&self, ids: &[Uuid]) -> Self {
        Self {
            active_timers: self
                .active_timers
                .iter()
                .filter(|t| !ids.contains(&t.id))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    /// Replace the recipe, restart at step 0 and drop the old recipe's timers.
    pub fn with_recipe(&self, recipe: Recipe) -> Self {
        Self::for_recipe(recipe)
    }

    /// Pull the step index back inside `[0, total_steps - 1]`.
    pub fn clamped(&self, total_steps: usize) -> Self {
        let last = total_steps.saturating_sub(1);
        Self {
            current_step_index: self.current_step_index.min(last),
            last_confirmed_step: self.last_confirmed_step.map(|i| i.min(last)),
            ..self.clone()
        }
    }

    /// Apply `patch` field by field; fields absent from the patch keep their values.
    pub fn merge(&self, patch: SessionPatch) -> Result<Self, ValidationError> {
        patch.validate(self.recipe.as_ref())?;

        let mut next = self.clone();
        if let Some(recipe) = patch.recipe {
            next.recipe = Some(recipe);
        }
        if let Some(index) = patch.current_step_index {
            next.current_step_index = index;
        }
        if let Some(last_confirmed) = patch.last_confirmed_step {
            next.last_confirmed_step = last_confirmed;
        }
        if let Some(timers) = patch.active_timers {
            next.active_timers = timers;
        }

        // An existing index may now sit past the end of a shorter recipe
        let total = next.total_steps();
        if total > 0 {
            next = next.clamped(total);
        }
        Ok(next)
    }
}

/// A partial session snapshot, as loaded from a store or sent by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_index: Option<usize>,
    /// `Some(None)` is an explicit null that clears the field
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    #[schema(value_type = Option<usize>)]
    pub last_confirmed_step: Option<Option<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_timers: Option<Vec<Timer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Recipe>,
}

/// Distinguish an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Reject snapshots that could never describe a valid session.
    pub fn validate(&self, existing_recipe: Option<&Recipe>) -> Result<(), ValidationError> {
        if let Some(recipe) = &self.recipe {
            if recipe.steps.is_empty() {
                return Err(ValidationError::NoSteps);
            }
        }

        if let Some(timers) = &self.active_timers {
            timers.iter().try_for_each(Timer::validate)?;
        }

        let total = self
            .recipe
            .as_ref()
            .or(existing_recipe)
            .map(Recipe::total_steps);
        if let (Some(total), Some(index)) = (total, self.current_step_index) {
            if index >= total {
                return Err(ValidationError::StepOutOfRange {
                    received: i64::try_from(index).unwrap_or(i64::MAX),
                    max: total.saturating_sub(1),
                });
            }
        }

        Ok(())
    }
}

impl From<&Session> for SessionPatch {
    fn from(session: &Session) -> Self {
        Self {
            current_step_index: Some(session.current_step_index),
            last_confirmed_step: Some(session.last_confirmed_step),
            active_timers: Some(session.active_timers.clone()),
            recipe: session.recipe.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn recipe(steps: usize) -> Recipe {
        Recipe {
            title: "Soup".to_string(),
            ingredients: vec!["water".to_string(), "salt".to_string()],
            steps: (0..steps).map(|i| format!("step {}", i)).collect(),
        }
    }

    fn at(index: usize) -> Session {
        Session {
            current_step_index: index,
            ..Session::default()
        }
    }

    #[test]
    fn test_advance_is_bounded() {
        for n in 1..6usize {
            for i in 0..n {
                for k in 0..8usize {
                    let mut session = at(i);
                    for _ in 0..k {
                        session = session.advance(n);
                    }
                    assert_eq!(session.current_step_index, (i + k).min(n - 1));
                }
            }
        }
    }

    #[test]
    fn test_go_back_is_bounded() {
        for i in 0..6usize {
            for k in 0..8usize {
                let mut session = at(i);
                for _ in 0..k {
                    session = session.go_back();
                }
                assert_eq!(session.current_step_index, i.saturating_sub(k));
            }
        }
    }

    #[test]
    fn test_advance_sets_last_confirmed() {
        let session = at(0).advance(3);
        assert_eq!(session.current_step_index, 1);
        assert_eq!(session.last_confirmed_step, Some(1));

        let at_end = at(2).advance(3);
        assert_eq!(at_end, at(2).advance(3).advance(3));
        assert_eq!(at_end.current_step_index, 2);
    }

    #[test]
    fn test_advance_without_steps_is_noop() {
        assert_eq!(at(0).advance(0), at(0));
    }

    #[test]
    fn test_repeat_only_touches_last_confirmed() {
        for i in 0..5 {
            let before = at(i);
            let after = before.repeat();
            assert_eq!(after.current_step_index, i);
            assert_eq!(after.last_confirmed_step, Some(i));
            assert_eq!(after.active_timers, before.active_timers);
        }
    }

    #[test]
    fn test_advance_checked() {
        let session = Session::for_recipe(recipe(2));
        let next = session.advance_checked().unwrap();
        assert_eq!(next.current_step_index, 1);
        assert_eq!(
            next.advance_checked(),
            Err(ValidationError::AlreadyAtLastStep)
        );
        assert_eq!(
            Session::default().advance_checked(),
            Err(ValidationError::MissingRecipe)
        );
    }

    #[test]
    fn test_go_to() {
        let session = Session::for_recipe(recipe(4));
        let jumped = session.go_to(3, 4).unwrap();
        assert_eq!(jumped.current_step_index, 3);
        assert_eq!(jumped.last_confirmed_step, Some(3));
        assert_eq!(
            session.go_to(4, 4),
            Err(ValidationError::StepOutOfRange {
                received: 4,
                max: 3
            })
        );
        assert!(session.go_to(-1, 4).is_err());
    }

    #[test]
    fn test_set_timer_appends_in_order() {
        let (one, first) = Session::default().set_timer(60, None, NOW).unwrap();
        let (two, second) = one.set_timer(120, Some("Rice"), NOW).unwrap();
        assert_eq!(two.active_timers, vec![first, second]);
        assert!(two.set_timer(0, None, NOW).is_err());
    }

    #[test]
    fn test_remove_timers() {
        let (one, first) = Session::default().set_timer(60, None, NOW).unwrap();
        let (two, second) = one.set_timer(60, None, NOW).unwrap();
        let remaining = two.remove_timers(&[first.id]);
        assert_eq!(remaining.active_timers, vec![second]);
    }

    #[test]
    fn test_with_recipe_resets_and_clears_timers() {
        let (session, _) = Session::for_recipe(recipe(5))
            .advance(5)
            .set_timer(60, None, NOW)
            .unwrap();
        let replaced = session.with_recipe(recipe(2));
        assert_eq!(replaced.current_step_index, 0);
        assert_eq!(replaced.last_confirmed_step, None);
        assert!(replaced.active_timers.is_empty());
        assert_eq!(replaced.total_steps(), 2);
    }

    #[test]
    fn test_restore_merges_over_defaults() {
        let patch: SessionPatch =
            serde_json::from_value(serde_json::json!({"currentStepIndex": 3})).unwrap();
        let session = Session::restore(patch).unwrap();
        assert_eq!(
            session,
            Session {
                current_step_index: 3,
                last_confirmed_step: None,
                active_timers: vec![],
                recipe: None,
            }
        );
    }

    #[test]
    fn test_explicit_null_clears_last_confirmed() {
        let base = at(2).repeat();
        let absent: SessionPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(base.merge(absent).unwrap().last_confirmed_step, Some(2));

        let null: SessionPatch =
            serde_json::from_str(r#"{"lastConfirmedStep": null}"#).unwrap();
        assert_eq!(null.last_confirmed_step, Some(None));
        assert_eq!(base.merge(null).unwrap().last_confirmed_step, None);
    }

    #[test]
    fn test_patch_validation() {
        let out_of_range = SessionPatch {
            current_step_index: Some(5),
            recipe: Some(recipe(3)),
            ..SessionPatch::default()
        };
        assert!(matches!(
            Session::restore(out_of_range),
            Err(ValidationError::StepOutOfRange { .. })
        ));

        let empty_recipe = SessionPatch {
            recipe: Some(recipe(0)),
            ..SessionPatch::default()
        };
        assert_eq!(
            Session::restore(empty_recipe),
            Err(ValidationError::NoSteps)
        );
    }

    #[test]
    fn test_new_shorter_recipe_clamps_index() {
        let session = Session::for_recipe(recipe(6)).go_to(5, 6).unwrap();
        let patched = session
            .merge(SessionPatch {
                recipe: Some(recipe(2)),
                ..SessionPatch::default()
            })
            .unwrap();
        assert_eq!(patched.current_step_index, 1);
        assert_eq!(patched.last_confirmed_step, Some(1));
    }

    #[test]
    fn test_snapshot_round_trip_through_patch() {
        let (session, _) = Session::for_recipe(recipe(3))
            .advance(3)
            .set_timer(45, None, NOW)
            .unwrap();
        let json = serde_json::to_string(&SessionPatch::from(&session)).unwrap();
        let patch: SessionPatch = serde_json::from_str(&json).unwrap();
        assert_eq!(Session::restore(patch).unwrap(), session);
    }

    #[test]
    fn test_implausible_end_time_is_rejected() {
        let (session, _) = Session::for_recipe(recipe(2)).set_timer(30, None, NOW).unwrap();
        let mut json = serde_json::to_value(&session).unwrap();
        json["activeTimers"][0]["endTime"] = serde_json::json!(i64::MIN);

        let bad: Session = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(bad.validate_timers(), Err(ValidationError::InvalidEndTime));

        let patch: SessionPatch = serde_json::from_value(json).unwrap();
        assert_eq!(
            Session::restore(patch),
            Err(ValidationError::InvalidEndTime)
        );
        assert_eq!(session.validate_timers(), Ok(()));
    }
}
