//! crates/workout_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or clocks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Exercise, ExercisePrescription, NewSession, SessionHistoryEntry, SetRecord, User,
    UserCredentials, WorkoutDefinition, WorkoutOverview,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The persistence calls an active workout session makes.
#[async_trait]
pub trait WorkoutStore: Send + Sync {
    /// Opens a session row and returns its identifier.
    async fn create_session(&self, session: NewSession) -> PortResult<Uuid>;

    async fn record_set(&self, set: SetRecord) -> PortResult<()>;

    async fn finalize_session(
        &self,
        session_id: Uuid,
        completed_at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> PortResult<()>;
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Exercise Library ---
    async fn list_exercises(&self) -> PortResult<Vec<Exercise>>;

    async fn create_exercise(
        &self,
        name: &str,
        muscle_group: Option<&str>,
        equipment: Option<&str>,
    ) -> PortResult<Exercise>;

    // --- Workout Builder ---
    async fn create_workout(
        &self,
        user_id: Uuid,
        name: &str,
        exercises: &[ExercisePrescription],
    ) -> PortResult<WorkoutDefinition>;

    /// Loads a workout owned by `user_id`; other users' workouts are `NotFound`.
    async fn get_workout(&self, user_id: Uuid, workout_id: Uuid) -> PortResult<WorkoutDefinition>;

    async fn list_workouts(&self, user_id: Uuid) -> PortResult<Vec<WorkoutOverview>>;

    // --- History ---
    async fn list_sessions(&self, user_id: Uuid) -> PortResult<Vec<SessionHistoryEntry>>;

    async fn get_session_sets(&self, user_id: Uuid, session_id: Uuid) -> PortResult<Vec<SetRecord>>;
}

/// Source of the current time, injected so session durations can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
