//! crates/workout_core/src/session.rs
//!
//! The active-workout controller. It owns the state of one in-progress workout:
//! which exercise is current, the input values of its sets, and the rest
//! countdown between sets. Every persistence step goes through a `WorkoutStore`,
//! and local state only changes once the store has acknowledged the call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{
    ExercisePrescription, NewSession, SessionSummary, SetEntry, SetField, SetRecord, UserContext,
    WorkoutDefinition, DEFAULT_REST_SECONDS,
};
use crate::ports::{Clock, PortError, WorkoutStore};

//=========================================================================================
// Errors and Outcomes
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Required input is missing or malformed. State is unchanged.
    #[error("Validation error: {0}")]
    Validation(String),
    /// The store rejected or failed a call. State is unchanged.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PortError),
    /// The operation is not available in the current state.
    #[error("Precondition failed: {0}")]
    Precondition(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    InProgress,
    Finished,
    Aborted,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionPhase::InProgress)
    }
}

/// Result of `advance_exercise`.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Moved on to the exercise at this index.
    NextExercise(usize),
    /// The last exercise was done, so the session was finalized.
    Finished(SessionSummary),
}

//=========================================================================================
// The Controller
//=========================================================================================

/// One workout being performed. A value of this type only exists once the
/// store has created the session, so `session_id` is always known.
pub struct ActiveWorkoutSession {
    user: UserContext,
    store: Arc<dyn WorkoutStore>,
    clock: Arc<dyn Clock>,
    workout: WorkoutDefinition,
    session_id: Uuid,
    started_at: DateTime<Utc>,
    current_exercise_index: usize,
    sets: Vec<SetEntry>,
    rest_remaining: u32,
    sets_completed: usize,
    phase: SessionPhase,
}

impl ActiveWorkoutSession {
    /// Opens a session in the store and prepares the sets of the first exercise.
    pub async fn start(
        user: UserContext,
        store: Arc<dyn WorkoutStore>,
        clock: Arc<dyn Clock>,
        workout: WorkoutDefinition,
    ) -> Result<Self, SessionError> {
        let first = workout.exercises.first().ok_or_else(|| {
            SessionError::Precondition(format!("workout '{}' has no exercises", workout.name))
        })?;
        if let Some(empty) = workout.exercises.iter().find(|e| e.set_count == 0) {
            return Err(SessionError::Precondition(format!(
                "exercise '{}' prescribes no sets",
                empty.name
            )));
        }
        let sets = SetEntry::for_prescription(first);

        let started_at = clock.now();
        let session_id = store
            .create_session(NewSession {
                user_id: user.user_id,
                workout_id: workout.id,
                workout_name: workout.name.clone(),
                started_at,
            })
            .await
            .map_err(|e| {
                error!("Failed to create session for workout {}: {:?}", workout.id, e);
                SessionError::from(e)
            })?;

        info!(
            "Session {} started for workout '{}' ({} exercises)",
            session_id,
            workout.name,
            workout.exercises.len()
        );

        Ok(Self {
            user,
            store,
            clock,
            workout,
            session_id,
            started_at,
            current_exercise_index: 0,
            sets,
            rest_remaining: 0,
            sets_completed: 0,
            phase: SessionPhase::InProgress,
        })
    }

    // --- Accessors ---

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn user(&self) -> UserContext {
        self.user
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn workout(&self) -> &WorkoutDefinition {
        &self.workout
    }

    pub fn current_exercise_index(&self) -> usize {
        self.current_exercise_index
    }

    pub fn current_exercise(&self) -> &ExercisePrescription {
        &self.workout.exercises[self.current_exercise_index]
    }

    pub fn sets(&self) -> &[SetEntry] {
        &self.sets
    }

    pub fn rest_remaining(&self) -> u32 {
        self.rest_remaining
    }

    pub fn is_resting(&self) -> bool {
        self.rest_remaining > 0
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_final_exercise(&self) -> bool {
        self.current_exercise_index + 1 == self.workout.exercises.len()
    }

    /// True once every set of the final exercise is completed, i.e. nothing
    /// is left to perform in the whole workout.
    pub fn is_workout_complete(&self) -> bool {
        self.is_final_exercise() && self.sets.iter().all(|s| s.completed)
    }

    // --- Set Input ---

    /// Replaces one input value of a set. Completed sets are left untouched.
    pub fn update_set_field(&mut self, set_index: usize, field: SetField) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        let entry = self.set_mut(set_index)?;
        if entry.completed {
            debug!("Ignoring edit of completed set {}", entry.set_number);
            return Ok(());
        }
        match field {
            SetField::Weight(weight) => entry.weight = weight,
            SetField::Reps(reps) => entry.reps = reps,
            SetField::Rpe(rpe) => entry.rpe = rpe,
        }
        Ok(())
    }

    /// Records a set with the store and, once acknowledged, marks it completed.
    ///
    /// Starts the rest countdown unless this completion finishes the workout.
    pub async fn complete_set(&mut self, set_index: usize) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        let session_id = self.session_id;
        let entry = self.set_mut(set_index)?;
        if entry.completed {
            return Err(SessionError::Precondition(format!(
                "set {} is already completed",
                entry.set_number
            )));
        }
        if entry.weight.is_none() || entry.reps.is_none() {
            warn!("Rejected completion of set {}: missing weight/reps", entry.set_number);
            return Err(SessionError::Validation("missing weight/reps".to_string()));
        }

        let record = SetRecord::from_entry(session_id, entry);
        let rest_seconds = entry.rest_seconds.unwrap_or(DEFAULT_REST_SECONDS);

        if let Err(e) = self.store.record_set(record).await {
            error!(
                "Failed to record set {} of session {}: {:?}",
                set_index + 1,
                session_id,
                e
            );
            return Err(e.into());
        }

        self.sets[set_index].completed = true;
        self.sets_completed += 1;
        info!(
            "Session {}: completed set {} of '{}'",
            self.session_id, self.sets[set_index].set_number, self.sets[set_index].exercise_name
        );

        if !self.is_workout_complete() {
            self.rest_remaining = rest_seconds;
        }
        Ok(())
    }

    // --- Rest Timer ---

    /// Counts one second off the rest timer. Returns whether rest continues.
    pub fn tick(&mut self) -> bool {
        if self.rest_remaining == 0 {
            return false;
        }
        self.rest_remaining -= 1;
        if self.rest_remaining == 0 {
            debug!("Session {}: rest finished", self.session_id);
        }
        self.is_resting()
    }

    pub fn skip_rest(&mut self) {
        self.rest_remaining = 0;
    }

    /// Adds time to an active rest. Does nothing when not resting.
    pub fn extend_rest(&mut self, seconds: u32) {
        if !self.is_resting() {
            debug!("Ignoring rest extension while not resting");
            return;
        }
        self.rest_remaining = self.rest_remaining.saturating_add(seconds);
    }

    // --- Progression ---

    /// Moves to the next exercise once every set of the current one is done.
    /// On the final exercise this finalizes the session instead.
    pub async fn advance_exercise(&mut self) -> Result<Advance, SessionError> {
        self.ensure_in_progress()?;
        if let Some(open) = self.sets.iter().find(|s| !s.completed) {
            return Err(SessionError::Precondition(format!(
                "set {} of '{}' is not completed",
                open.set_number, open.exercise_name
            )));
        }

        if self.is_final_exercise() {
            let summary = self.finish().await?;
            return Ok(Advance::Finished(summary));
        }

        self.current_exercise_index += 1;
        self.sets = SetEntry::for_prescription(&self.workout.exercises[self.current_exercise_index]);
        info!(
            "Session {}: advanced to exercise {} '{}'",
            self.session_id,
            self.current_exercise_index,
            self.current_exercise().name
        );
        Ok(Advance::NextExercise(self.current_exercise_index))
    }

    /// Finalizes the session with the store. On failure nothing changes and
    /// the call may be retried.
    pub async fn finish(&mut self) -> Result<SessionSummary, SessionError> {
        self.ensure_in_progress()?;
        let completed_at = self.clock.now();
        let duration_minutes = rounded_minutes(self.started_at, completed_at);

        if let Err(e) = self
            .store
            .finalize_session(self.session_id, completed_at, duration_minutes)
            .await
        {
            error!("Failed to finalize session {}: {:?}", self.session_id, e);
            return Err(e.into());
        }

        self.phase = SessionPhase::Finished;
        self.rest_remaining = 0;
        info!(
            "Session {} finished after {} min ({} sets)",
            self.session_id, duration_minutes, self.sets_completed
        );

        Ok(SessionSummary {
            session_id: self.session_id,
            workout_name: self.workout.name.clone(),
            duration_minutes,
            sets_completed: self.sets_completed,
            completed_at,
        })
    }

    /// Abandons the session. Sets already recorded stay in the store under a
    /// session that never gets a completion time.
    pub fn abort(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        self.phase = SessionPhase::Aborted;
        self.rest_remaining = 0;
        info!(
            "Session {} aborted with {} recorded sets",
            self.session_id, self.sets_completed
        );
    }

    // --- Helpers ---

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::InProgress => Ok(()),
            phase => Err(SessionError::Precondition(format!(
                "session {} is {:?}",
                self.session_id, phase
            ))),
        }
    }

    fn set_mut(&mut self, set_index: usize) -> Result<&mut SetEntry, SessionError> {
        let count = self.sets.len();
        self.sets.get_mut(set_index).ok_or_else(|| {
            SessionError::Precondition(format!(
                "set index {} out of range (exercise has {} sets)",
                set_index, count
            ))
        })
    }
}

/// Whole minutes between two instants, rounded half away from zero.
fn rounded_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds().max(0);
    (millis as f64 / 60_000.0).round() as i64
}

//=========================================================================================
// Tests
//=========================================================================================
