//! services/api/src/web/session_task.rs
//!
//! Drives one active workout on behalf of a WebSocket connection. Every client
//! message is applied to the session controller, and the outcome is reported
//! back as `ServerMessage`s on the connection's outgoing channel.

use crate::web::{
    protocol::{to_set_field, ClientMessage, ServerMessage, SessionSnapshot},
    rest_timer::{spawn_rest_timer, RestTimerHandle},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tracing::{info, warn};
use workout_core::{ActiveWorkoutSession, Advance, SessionError};

/// Whether the connection should keep reading messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

pub struct WorkoutConnection {
    session: Arc<Mutex<ActiveWorkoutSession>>,
    events: UnboundedSender<ServerMessage>,
    rest_tick: Duration,
    rest_timer: Option<RestTimerHandle>,
}

impl WorkoutConnection {
    /// Wraps a freshly started session and announces it to the client.
    pub fn new(
        session: ActiveWorkoutSession,
        events: UnboundedSender<ServerMessage>,
        rest_tick: Duration,
    ) -> Self {
        let started = ServerMessage::SessionStarted {
            session_id: session.session_id(),
            snapshot: SessionSnapshot::of(&session),
        };
        let _ = events.send(started);
        Self {
            session: Arc::new(Mutex::new(session)),
            events,
            rest_tick,
            rest_timer: None,
        }
    }

    /// Decodes one text frame and applies it. Frames that do not decode are
    /// answered with an error so the client can correct and resend.
    pub async fn handle_text(&mut self, text: &str) -> Flow {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                warn!("Unparseable client message: {}", e);
                self.send_error(&format!("Malformed message: {}", e));
                Flow::Continue
            }
        }
    }

    pub async fn handle(&mut self, message: ClientMessage) -> Flow {
        match message {
            ClientMessage::Start { .. } => {
                self.send_error("A session is already running on this connection.");
                Flow::Continue
            }

            ClientMessage::UpdateSetField {
                set_index,
                field,
                value,
            } => {
                let field = match to_set_field(field, value) {
                    Ok(field) => field,
                    Err(message) => {
                        self.send_error(&message);
                        return Flow::Continue;
                    }
                };
                let mut session = self.session.lock().await;
                match session.update_set_field(set_index, field) {
                    Ok(()) => self.send_state(&session),
                    Err(e) => self.send_session_error(&e),
                }
                Flow::Continue
            }

            ClientMessage::CompleteSet { set_index } => {
                // The lock is held across the store call, so a repeated press
                // waits here and is then rejected as already completed.
                let mut session = self.session.lock().await;
                match session.complete_set(set_index).await {
                    Ok(()) => {
                        if session.is_resting() {
                            self.rest_timer = Some(spawn_rest_timer(
                                self.session.clone(),
                                self.events.clone(),
                                self.rest_tick,
                            ));
                        }
                        self.send_state(&session);
                    }
                    Err(e) => self.send_session_error(&e),
                }
                Flow::Continue
            }

            ClientMessage::SkipRest => {
                self.rest_timer = None;
                let mut session = self.session.lock().await;
                let was_resting = session.is_resting();
                session.skip_rest();
                if was_resting {
                    let _ = self.events.send(ServerMessage::RestEnded);
                }
                self.send_state(&session);
                Flow::Continue
            }

            ClientMessage::ExtendRest { seconds } => {
                let mut session = self.session.lock().await;
                session.extend_rest(seconds);
                self.send_state(&session);
                Flow::Continue
            }

            ClientMessage::AdvanceExercise => {
                let mut session = self.session.lock().await;
                match session.advance_exercise().await {
                    Ok(Advance::NextExercise(_)) => {
                        self.send_state(&session);
                        Flow::Continue
                    }
                    Ok(Advance::Finished(summary)) => {
                        self.rest_timer = None;
                        let _ = self.events.send(summary.into());
                        Flow::Close
                    }
                    Err(e) => {
                        self.send_session_error(&e);
                        Flow::Continue
                    }
                }
            }

            ClientMessage::Finish => {
                let mut session = self.session.lock().await;
                match session.finish().await {
                    Ok(summary) => {
                        self.rest_timer = None;
                        let _ = self.events.send(summary.into());
                        Flow::Close
                    }
                    Err(e) => {
                        self.send_session_error(&e);
                        Flow::Continue
                    }
                }
            }

            ClientMessage::Abort => {
                self.rest_timer = None;
                self.session.lock().await.abort();
                let _ = self.events.send(ServerMessage::Aborted);
                Flow::Close
            }
        }
    }

    /// Tears the session down when the connection goes away. A session that
    /// was not finished is aborted.
    pub async fn close(mut self) {
        self.rest_timer = None;
        let mut session = self.session.lock().await;
        if !session.phase().is_terminal() {
            info!(
                "Connection closed mid-workout, aborting session {}",
                session.session_id()
            );
            session.abort();
        }
    }

    fn send_state(&self, session: &ActiveWorkoutSession) {
        let _ = self.events.send(ServerMessage::State {
            snapshot: SessionSnapshot::of(session),
        });
    }

    fn send_session_error(&self, error: &SessionError) {
        warn!("Rejected workout operation: {}", error);
        let message = match error {
            SessionError::Persistence(_) => {
                "Could not save your workout. Please try again.".to_string()
            }
            other => other.to_string(),
        };
        self.send_error(&message);
    }

    fn send_error(&self, message: &str) {
        let _ = self.events.send(ServerMessage::Error {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::protocol::SetFieldName;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use uuid::Uuid;
    use workout_core::{
        ExercisePrescription, InMemoryWorkoutStore, NewSession, PortResult, SetRecord,
        SystemClock, UserContext, WorkoutDefinition, WorkoutStore,
    };

    const TICK: Duration = Duration::from_millis(5);

    async fn connect(
        store: &Arc<InMemoryWorkoutStore>,
        rest_seconds: u32,
    ) -> (WorkoutConnection, UnboundedReceiver<ServerMessage>, Uuid) {
        connect_with(store.clone(), 1, rest_seconds, TICK).await
    }

    async fn connect_with(
        store: Arc<dyn WorkoutStore>,
        set_count: u32,
        rest_seconds: u32,
        tick: Duration,
    ) -> (WorkoutConnection, UnboundedReceiver<ServerMessage>, Uuid) {
        let prescription = |name: &str| ExercisePrescription {
            exercise_id: Uuid::new_v4(),
            name: name.to_string(),
            set_count,
            target_reps: Some(5),
            rest_seconds: Some(rest_seconds),
        };
        let workout = WorkoutDefinition {
            id: Uuid::new_v4(),
            name: "Upper".to_string(),
            exercises: vec![prescription("Bench Press"), prescription("Barbell Row")],
        };
        let session = ActiveWorkoutSession::start(
            UserContext {
                user_id: Uuid::new_v4(),
            },
            store,
            Arc::new(SystemClock),
            workout,
        )
        .await
        .unwrap();
        let session_id = session.session_id();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = WorkoutConnection::new(session, tx, tick);
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::SessionStarted { .. })
        ));
        (connection, rx, session_id)
    }

    /// An in-memory store whose `record_set` takes a while to answer.
    struct SlowStore {
        inner: InMemoryWorkoutStore,
        delay: Duration,
    }

    #[async_trait]
    impl WorkoutStore for SlowStore {
        async fn create_session(&self, session: NewSession) -> PortResult<Uuid> {
            self.inner.create_session(session).await
        }

        async fn record_set(&self, set: SetRecord) -> PortResult<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.record_set(set).await
        }

        async fn finalize_session(
            &self,
            session_id: Uuid,
            completed_at: DateTime<Utc>,
            duration_minutes: i64,
        ) -> PortResult<()> {
            self.inner
                .finalize_session(session_id, completed_at, duration_minutes)
                .await
        }
    }

    async fn fill_set(connection: &mut WorkoutConnection, weight: f64, reps: f64) {
        fill_set_at(connection, 0, weight, reps).await;
    }

    async fn fill_set_at(connection: &mut WorkoutConnection, set_index: usize, weight: f64, reps: f64) {
        for (field, value) in [(SetFieldName::Weight, weight), (SetFieldName::Reps, reps)] {
            let flow = connection
                .handle(ClientMessage::UpdateSetField {
                    set_index,
                    field,
                    value: Some(value),
                })
                .await;
            assert_eq!(flow, Flow::Continue);
        }
    }

    fn expect_state(message: Option<ServerMessage>) -> SessionSnapshot {
        match message {
            Some(ServerMessage::State { snapshot }) => snapshot,
            other => panic!("expected a state message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_incomplete_set_is_reported_as_error() {
        let store = Arc::new(InMemoryWorkoutStore::new());
        let (mut connection, mut rx, session_id) = connect(&store, 30).await;

        let flow = connection
            .handle(ClientMessage::CompleteSet { set_index: 0 })
            .await;

        assert_eq!(flow, Flow::Continue);
        match rx.recv().await {
            Some(ServerMessage::Error { message }) => assert!(message.contains("missing weight/reps")),
            other => panic!("expected an error, got {:?}", other),
        }
        assert!(store.recorded_sets(session_id).is_empty());
    }

    #[tokio::test]
    async fn test_bad_reps_value_is_rejected_before_the_session() {
        let store = Arc::new(InMemoryWorkoutStore::new());
        let (mut connection, mut rx, _) = connect(&store, 30).await;

        connection
            .handle(ClientMessage::UpdateSetField {
                set_index: 0,
                field: SetFieldName::Reps,
                value: Some(4.5),
            })
            .await;

        assert!(matches!(rx.recv().await, Some(ServerMessage::Error { .. })));
    }

    #[tokio::test]
    async fn test_completed_set_starts_rest_countdown() {
        let store = Arc::new(InMemoryWorkoutStore::new());
        let (mut connection, mut rx, session_id) = connect(&store, 2).await;

        fill_set(&mut connection, 80.0, 8.0).await;
        expect_state(rx.recv().await);
        expect_state(rx.recv().await);

        connection
            .handle(ClientMessage::CompleteSet { set_index: 0 })
            .await;
        let snapshot = expect_state(rx.recv().await);
        assert!(snapshot.is_resting);
        assert_eq!(snapshot.rest_remaining, 2);
        assert!(snapshot.sets[0].completed);
        assert_eq!(store.recorded_sets(session_id).len(), 1);

        assert_eq!(rx.recv().await, Some(ServerMessage::RestTick { remaining: 1 }));
        assert_eq!(rx.recv().await, Some(ServerMessage::RestEnded));
    }

    #[tokio::test]
    async fn test_full_workout_finishes_and_closes() {
        let store = Arc::new(InMemoryWorkoutStore::new());
        let (mut connection, mut rx, session_id) = connect(&store, 600).await;

        fill_set(&mut connection, 60.0, 10.0).await;
        connection
            .handle(ClientMessage::CompleteSet { set_index: 0 })
            .await;
        connection.handle(ClientMessage::SkipRest).await;
        assert_eq!(
            connection.handle(ClientMessage::AdvanceExercise).await,
            Flow::Continue
        );
        fill_set(&mut connection, 50.0, 12.0).await;
        connection
            .handle(ClientMessage::CompleteSet { set_index: 0 })
            .await;
        assert_eq!(
            connection.handle(ClientMessage::AdvanceExercise).await,
            Flow::Close
        );

        let mut saw_rest_ended = false;
        let mut last = None;
        while let Ok(message) = rx.try_recv() {
            if message == ServerMessage::RestEnded {
                saw_rest_ended = true;
            }
            last = Some(message);
        }
        assert!(saw_rest_ended);
        match last {
            Some(ServerMessage::Finished {
                session_id: id,
                workout_name,
                sets_completed,
                ..
            }) => {
                assert_eq!(id, session_id);
                assert_eq!(workout_name, "Upper");
                assert_eq!(sets_completed, 2);
            }
            other => panic!("expected the workout to finish, got {:?}", other),
        }
        assert!(store.session(session_id).unwrap().completed_at.is_some());
        assert_eq!(store.recorded_sets(session_id).len(), 2);
    }

    #[tokio::test]
    async fn test_close_aborts_unfinished_session() {
        let store = Arc::new(InMemoryWorkoutStore::new());
        let (mut connection, _rx, session_id) = connect(&store, 30).await;
        fill_set(&mut connection, 60.0, 10.0).await;
        connection
            .handle(ClientMessage::CompleteSet { set_index: 0 })
            .await;

        connection.close().await;

        let stored = store.session(session_id).unwrap();
        assert!(stored.completed_at.is_none());
        assert_eq!(store.recorded_sets(session_id).len(), 1);
    }

    #[tokio::test]
    async fn test_replaced_rest_timer_does_not_tick_new_rest() {
        let store = Arc::new(SlowStore {
            inner: InMemoryWorkoutStore::new(),
            delay: Duration::from_millis(50),
        });
        let (mut connection, mut rx, _) =
            connect_with(store, 3, 5, Duration::from_millis(20)).await;

        fill_set_at(&mut connection, 0, 100.0, 5.0).await;
        connection
            .handle(ClientMessage::CompleteSet { set_index: 0 })
            .await;

        // The first countdown comes due while this completion holds the session.
        fill_set_at(&mut connection, 1, 100.0, 5.0).await;
        connection
            .handle(ClientMessage::CompleteSet { set_index: 1 })
            .await;

        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(connection.session.lock().await.rest_remaining(), 5);
        let mut last_snapshot = None;
        while let Ok(message) = rx.try_recv() {
            match message {
                ServerMessage::State { snapshot } => last_snapshot = Some(snapshot),
                ServerMessage::RestTick { .. } | ServerMessage::RestEnded => {
                    panic!("unexpected countdown message: {:?}", message)
                }
                _ => {}
            }
        }
        let snapshot = last_snapshot.expect("a state after the second completion");
        assert!(snapshot.sets[1].completed);
        assert_eq!(snapshot.rest_remaining, 5);
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error_reply() {
        let store = Arc::new(InMemoryWorkoutStore::new());
        let (mut connection, mut rx, session_id) = connect(&store, 30).await;

        for frame in [
            r#"{"type":"complete_set","set_index":-1}"#,
            r#"{"type":"update_set_field","set_index":0,"field":"wieght","value":50}"#,
            "not json",
        ] {
            assert_eq!(connection.handle_text(frame).await, Flow::Continue);
            match rx.recv().await {
                Some(ServerMessage::Error { message }) => {
                    assert!(message.starts_with("Malformed message"), "{}", message)
                }
                other => panic!("expected an error for {}, got {:?}", frame, other),
            }
        }

        assert_eq!(
            connection.handle_text(r#"{"type":"skip_rest"}"#).await,
            Flow::Continue
        );
        assert!(matches!(rx.recv().await, Some(ServerMessage::State { .. })));
        assert!(store.recorded_sets(session_id).is_empty());
    }
}
