//! crates/workout_core/src/memory.rs
//!
//! A `WorkoutStore` kept entirely in process memory. Useful for local runs and
//! as the backing store in tests of code built on top of the session controller.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{NewSession, SetRecord};
use crate::ports::{PortError, PortResult, WorkoutStore};

/// A session row as held by the in-memory store.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub user_id: Uuid,
    pub workout_id: Uuid,
    pub workout_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
}

#[derive(Default)]
struct Tables {
    sessions: HashMap<Uuid, StoredSession>,
    sets: Vec<SetRecord>,
}

#[derive(Default)]
pub struct InMemoryWorkoutStore {
    tables: Mutex<Tables>,
}

impl InMemoryWorkoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, session_id: Uuid) -> Option<StoredSession> {
        self.tables
            .lock()
            .ok()
            .and_then(|t| t.sessions.get(&session_id).cloned())
    }

    /// Sets recorded for a session, in the order they were recorded.
    pub fn recorded_sets(&self, session_id: Uuid) -> Vec<SetRecord> {
        self.tables
            .lock()
            .map(|t| {
                t.sets
                    .iter()
                    .filter(|s| s.session_id == session_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.tables.lock().map(|t| t.sessions.len()).unwrap_or(0)
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> PortResult<T>) -> PortResult<T> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory store lock poisoned".to_string()))?;
        f(&mut tables)
    }
}

#[async_trait]
impl WorkoutStore for InMemoryWorkoutStore {
    async fn create_session(&self, session: NewSession) -> PortResult<Uuid> {
        let id = Uuid::new_v4();
        self.with_tables(|t| {
            t.sessions.insert(
                id,
                StoredSession {
                    user_id: session.user_id,
                    workout_id: session.workout_id,
                    workout_name: session.workout_name,
                    started_at: session.started_at,
                    completed_at: None,
                    duration_minutes: None,
                },
            );
            Ok(id)
        })
    }

    async fn record_set(&self, set: SetRecord) -> PortResult<()> {
        self.with_tables(|t| {
            if !t.sessions.contains_key(&set.session_id) {
                return Err(PortError::NotFound(format!(
                    "Session {} not found",
                    set.session_id
                )));
            }
            t.sets.push(set);
            Ok(())
        })
    }

    async fn finalize_session(
        &self,
        session_id: Uuid,
        completed_at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> PortResult<()> {
        self.with_tables(|t| {
            let session = t
                .sessions
                .get_mut(&session_id)
                .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
            session.completed_at = Some(completed_at);
            session.duration_minutes = Some(duration_minutes);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session() -> NewSession {
        NewSession {
            user_id: Uuid::new_v4(),
            workout_id: Uuid::new_v4(),
            workout_name: "Push Day".to_string(),
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_set_requires_existing_session() {
        let store = InMemoryWorkoutStore::new();
        let record = SetRecord {
            session_id: Uuid::new_v4(),
            exercise_id: Uuid::new_v4(),
            exercise_name: "Bench Press".to_string(),
            set_number: 1,
            weight: Some(100.0),
            reps: Some(5),
            rpe: None,
            completed: true,
        };

        let err = store.record_set(record).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_finalize_marks_session_complete() {
        let store = InMemoryWorkoutStore::new();
        let id = store.create_session(new_session()).await.unwrap();
        assert!(store.session(id).unwrap().completed_at.is_none());

        let now = Utc::now();
        store.finalize_session(id, now, 42).await.unwrap();

        let stored = store.session(id).unwrap();
        assert_eq!(stored.completed_at, Some(now));
        assert_eq!(stored.duration_minutes, Some(42));
        assert_eq!(store.session_count(), 1);
    }
}
