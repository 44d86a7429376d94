//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` and `WorkoutStore` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use workout_core::domain::{
    Exercise, ExercisePrescription, NewSession, SessionHistoryEntry, SetRecord, User,
    UserCredentials, WorkoutDefinition, WorkoutOverview,
};
use workout_core::ports::{DatabaseService, PortError, PortResult, WorkoutStore};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` and `WorkoutStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => unexpected(e),
    }
}

fn conflict_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    let duplicate = e
        .as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation());
    if duplicate {
        PortError::Conflict(what)
    } else {
        unexpected(e)
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ExerciseRecord {
    id: Uuid,
    name: String,
    muscle_group: Option<String>,
    equipment: Option<String>,
}
impl ExerciseRecord {
    fn to_domain(self) -> Exercise {
        Exercise {
            id: self.id,
            name: self.name,
            muscle_group: self.muscle_group,
            equipment: self.equipment,
        }
    }
}

#[derive(FromRow)]
struct WorkoutRecord {
    id: Uuid,
    name: String,
}

#[derive(FromRow)]
struct WorkoutOverviewRecord {
    id: Uuid,
    name: String,
    exercise_count: i64,
    created_at: DateTime<Utc>,
}
impl WorkoutOverviewRecord {
    fn to_domain(self) -> WorkoutOverview {
        WorkoutOverview {
            id: self.id,
            name: self.name,
            exercise_count: self.exercise_count.max(0) as usize,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct PrescriptionRecord {
    exercise_id: Uuid,
    exercise_name: String,
    set_count: i32,
    target_reps: Option<i32>,
    rest_seconds: Option<i32>,
}
impl PrescriptionRecord {
    fn to_domain(self) -> ExercisePrescription {
        ExercisePrescription {
            exercise_id: self.exercise_id,
            name: self.exercise_name,
            set_count: self.set_count.max(0) as u32,
            target_reps: self.target_reps.map(|r| r.max(0) as u32),
            rest_seconds: self.rest_seconds.map(|r| r.max(0) as u32),
        }
    }
}

#[derive(FromRow)]
struct SessionHistoryRecord {
    id: Uuid,
    workout_id: Uuid,
    workout_name: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    duration_minutes: Option<i32>,
    sets_recorded: i64,
}
impl SessionHistoryRecord {
    fn to_domain(self) -> SessionHistoryEntry {
        SessionHistoryEntry {
            session_id: self.id,
            workout_id: self.workout_id,
            workout_name: self.workout_name,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_minutes: self.duration_minutes.map(i64::from),
            sets_recorded: self.sets_recorded,
        }
    }
}

#[derive(FromRow)]
struct SessionSetRecord {
    session_id: Uuid,
    exercise_id: Uuid,
    exercise_name: String,
    set_number: i32,
    weight: Option<f64>,
    reps: Option<i32>,
    rpe: Option<i16>,
    completed: bool,
}
impl SessionSetRecord {
    fn to_domain(self) -> SetRecord {
        SetRecord {
            session_id: self.session_id,
            exercise_id: self.exercise_id,
            exercise_name: self.exercise_name,
            set_number: self.set_number.max(0) as u32,
            weight: self.weight,
            reps: self.reps.map(|r| r.max(0) as u32),
            rpe: self.rpe.map(|r| r.clamp(0, u8::MAX as i16) as u8),
            completed: self.completed,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, hashed_password) VALUES ($1, $2) RETURNING user_id, email",
        )
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_unexpected(e, format!("User with email {}", email)))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_exercises(&self) -> PortResult<Vec<Exercise>> {
        let records = sqlx::query_as::<_, ExerciseRecord>(
            "SELECT id, name, muscle_group, equipment FROM exercises ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_exercise(
        &self,
        name: &str,
        muscle_group: Option<&str>,
        equipment: Option<&str>,
    ) -> PortResult<Exercise> {
        let record = sqlx::query_as::<_, ExerciseRecord>(
            "INSERT INTO exercises (name, muscle_group, equipment) VALUES ($1, $2, $3) RETURNING id, name, muscle_group, equipment",
        )
        .bind(name)
        .bind(muscle_group)
        .bind(equipment)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_unexpected(e, format!("Exercise '{}'", name)))?;
        Ok(record.to_domain())
    }

    async fn create_workout(
        &self,
        user_id: Uuid,
        name: &str,
        exercises: &[ExercisePrescription],
    ) -> PortResult<WorkoutDefinition> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let workout = sqlx::query_as::<_, WorkoutRecord>(
            "INSERT INTO workouts (user_id, name) VALUES ($1, $2) RETURNING id, name",
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        for (position, exercise) in exercises.iter().enumerate() {
            sqlx::query(
                "INSERT INTO workout_exercises (workout_id, position, exercise_id, exercise_name, set_count, target_reps, rest_seconds) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(workout.id)
            .bind(position as i32)
            .bind(exercise.exercise_id)
            .bind(&exercise.name)
            .bind(exercise.set_count as i32)
            .bind(exercise.target_reps.map(|r| r as i32))
            .bind(exercise.rest_seconds.map(|r| r as i32))
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;

        Ok(WorkoutDefinition {
            id: workout.id,
            name: workout.name,
            exercises: exercises.to_vec(),
        })
    }

    async fn get_workout(&self, user_id: Uuid, workout_id: Uuid) -> PortResult<WorkoutDefinition> {
        let workout = sqlx::query_as::<_, WorkoutRecord>(
            "SELECT id, name FROM workouts WHERE id = $1 AND user_id = $2",
        )
        .bind(workout_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Workout {} not found", workout_id)))?;

        let prescriptions = sqlx::query_as::<_, PrescriptionRecord>(
            "SELECT exercise_id, exercise_name, set_count, target_reps, rest_seconds FROM workout_exercises WHERE workout_id = $1 ORDER BY position ASC",
        )
        .bind(workout_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(WorkoutDefinition {
            id: workout.id,
            name: workout.name,
            exercises: prescriptions.into_iter().map(|r| r.to_domain()).collect(),
        })
    }

    async fn list_workouts(&self, user_id: Uuid) -> PortResult<Vec<WorkoutOverview>> {
        let records = sqlx::query_as::<_, WorkoutOverviewRecord>(
            "SELECT w.id, w.name, w.created_at, COUNT(we.position) AS exercise_count
             FROM workouts w
             LEFT JOIN workout_exercises we ON we.workout_id = w.id
             WHERE w.user_id = $1
             GROUP BY w.id
             ORDER BY w.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_sessions(&self, user_id: Uuid) -> PortResult<Vec<SessionHistoryEntry>> {
        let records = sqlx::query_as::<_, SessionHistoryRecord>(
            "SELECT s.id, s.workout_id, s.workout_name, s.started_at, s.completed_at, s.duration_minutes,
                    COUNT(ss.id) AS sets_recorded
             FROM workout_sessions s
             LEFT JOIN session_sets ss ON ss.session_id = s.id
             WHERE s.user_id = $1
             GROUP BY s.id
             ORDER BY s.started_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_session_sets(&self, user_id: Uuid, session_id: Uuid) -> PortResult<Vec<SetRecord>> {
        let owned: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM workout_sessions WHERE id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        if owned.is_none() {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }

        let records = sqlx::query_as::<_, SessionSetRecord>(
            "SELECT session_id, exercise_id, exercise_name, set_number, weight, reps, rpe, completed
             FROM session_sets WHERE session_id = $1 ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

//=========================================================================================
// `WorkoutStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl WorkoutStore for DbAdapter {
    async fn create_session(&self, session: NewSession) -> PortResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO workout_sessions (user_id, workout_id, workout_name, started_at) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(session.user_id)
        .bind(session.workout_id)
        .bind(&session.workout_name)
        .bind(session.started_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn record_set(&self, set: SetRecord) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO session_sets (session_id, exercise_id, exercise_name, set_number, weight, reps, rpe, completed) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(set.session_id)
        .bind(set.exercise_id)
        .bind(&set.exercise_name)
        .bind(set.set_number as i32)
        .bind(set.weight)
        .bind(set.reps.map(|r| r as i32))
        .bind(set.rpe.map(i16::from))
        .bind(set.completed)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn finalize_session(
        &self,
        session_id: Uuid,
        completed_at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE workout_sessions SET completed_at = $1, duration_minutes = $2 WHERE id = $3",
        )
        .bind(completed_at)
        .bind(duration_minutes.clamp(0, i32::MAX as i64) as i32)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }
}
