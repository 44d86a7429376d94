//! crates/workout_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Rest applied after a completed set when its prescription names none.
pub const DEFAULT_REST_SECONDS: u32 = 60;

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// The authenticated caller, handed to anything that acts on a user's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: Uuid,
}

/// An entry of the exercise library.
#[derive(Debug, Clone)]
pub struct Exercise {
    pub id: Uuid,
    pub name: String,
    pub muscle_group: Option<String>,
    pub equipment: Option<String>,
}

/// The planned sets/reps/rest for one exercise of a workout.
#[derive(Debug, Clone, PartialEq)]
pub struct ExercisePrescription {
    pub exercise_id: Uuid,
    pub name: String,
    pub set_count: u32,
    pub target_reps: Option<u32>,
    pub rest_seconds: Option<u32>,
}

/// A workout as built by the user: an ordered list of prescriptions.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutDefinition {
    pub id: Uuid,
    pub name: String,
    pub exercises: Vec<ExercisePrescription>,
}

/// Short listing form of a workout.
#[derive(Debug, Clone)]
pub struct WorkoutOverview {
    pub id: Uuid,
    pub name: String,
    pub exercise_count: usize,
    pub created_at: DateTime<Utc>,
}

/// The input values of one set during an active workout.
///
/// Exercise id and name are copied from the prescription when the entry is
/// built, so a recorded set keeps the name it was performed under.
#[derive(Debug, Clone, PartialEq)]
pub struct SetEntry {
    pub exercise_id: Uuid,
    pub exercise_name: String,
    pub set_number: u32,
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub rpe: Option<u8>,
    pub completed: bool,
    pub target_reps: Option<u32>,
    pub rest_seconds: Option<u32>,
}

impl SetEntry {
    /// Builds the untouched entries for every prescribed set of an exercise.
    pub fn for_prescription(prescription: &ExercisePrescription) -> Vec<SetEntry> {
        (1..=prescription.set_count)
            .map(|set_number| SetEntry {
                exercise_id: prescription.exercise_id,
                exercise_name: prescription.name.clone(),
                set_number,
                weight: None,
                reps: None,
                rpe: None,
                completed: false,
                target_reps: prescription.target_reps,
                rest_seconds: prescription.rest_seconds,
            })
            .collect()
    }
}

/// A single editable field of a `SetEntry`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetField {
    Weight(Option<f64>),
    Reps(Option<u32>),
    Rpe(Option<u8>),
}

/// Payload of the "create session" store call.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub workout_id: Uuid,
    pub workout_name: String,
    pub started_at: DateTime<Utc>,
}

/// Payload of the "record set" store call.
#[derive(Debug, Clone, PartialEq)]
pub struct SetRecord {
    pub session_id: Uuid,
    pub exercise_id: Uuid,
    pub exercise_name: String,
    pub set_number: u32,
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub rpe: Option<u8>,
    pub completed: bool,
}

impl SetRecord {
    pub fn from_entry(session_id: Uuid, entry: &SetEntry) -> Self {
        Self {
            session_id,
            exercise_id: entry.exercise_id,
            exercise_name: entry.exercise_name.clone(),
            set_number: entry.set_number,
            weight: entry.weight,
            reps: entry.reps,
            rpe: entry.rpe,
            completed: true,
        }
    }
}

/// A past or in-progress session as seen in the history screen.
#[derive(Debug, Clone)]
pub struct SessionHistoryEntry {
    pub session_id: Uuid,
    pub workout_id: Uuid,
    pub workout_name: String,
    pub started_at: DateTime<Utc>,
    /// `None` for sessions that were never finished.
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub sets_recorded: i64,
}

/// What the caller gets back once a session has been finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub workout_name: String,
    pub duration_minutes: i64,
    pub sets_completed: usize,
    pub completed_at: DateTime<Utc>,
}
