//! services/api/src/web/rest_timer.rs
//!
//! The background countdown that runs while a session is resting. It ticks the
//! shared session once per period and reports every tick to the connection.

use crate::web::protocol::ServerMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use workout_core::ActiveWorkoutSession;

/// A running countdown. Dropping the handle cancels the task.
pub struct RestTimerHandle {
    token: CancellationToken,
    _task: JoinHandle<()>,
}

impl Drop for RestTimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Spawns the countdown for a session that has just started resting.
pub fn spawn_rest_timer(
    session: Arc<Mutex<ActiveWorkoutSession>>,
    events: UnboundedSender<ServerMessage>,
    period: Duration,
) -> RestTimerHandle {
    let token = CancellationToken::new();
    let handle = tokio::spawn(rest_countdown(session, events, period, token.clone()));
    RestTimerHandle { token, _task: handle }
}

async fn rest_countdown(
    session: Arc<Mutex<ActiveWorkoutSession>>,
    events: UnboundedSender<ServerMessage>,
    period: Duration,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    // The first tick of an interval completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Rest timer cancelled.");
                return;
            }
            _ = interval.tick() => {}
        }

        // A handler may hold the lock across a store call and replace this
        // timer meanwhile, so cancellation is re-checked once the lock is ours.
        let (still_resting, remaining) = {
            let mut session = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Rest timer cancelled while waiting for the session.");
                    return;
                }
                guard = session.lock() => guard,
            };
            if token.is_cancelled() {
                debug!("Rest timer cancelled while waiting for the session.");
                return;
            }
            let still_resting = session.tick();
            (still_resting, session.rest_remaining())
        };

        let message = if still_resting {
            ServerMessage::RestTick { remaining }
        } else {
            ServerMessage::RestEnded
        };
        if events.send(message).is_err() {
            debug!("Connection gone, stopping rest timer.");
            return;
        }
        if !still_resting {
            debug!("Rest timer finished.");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use uuid::Uuid;
    use workout_core::{
        ExercisePrescription, InMemoryWorkoutStore, SetField, SystemClock, UserContext,
        WorkoutDefinition,
    };

    async fn resting_session(rest_seconds: u32) -> Arc<Mutex<ActiveWorkoutSession>> {
        let workout = WorkoutDefinition {
            id: Uuid::new_v4(),
            name: "Legs".to_string(),
            exercises: vec![ExercisePrescription {
                exercise_id: Uuid::new_v4(),
                name: "Back Squat".to_string(),
                set_count: 3,
                target_reps: Some(5),
                rest_seconds: Some(rest_seconds),
            }],
        };
        let mut session = ActiveWorkoutSession::start(
            UserContext {
                user_id: Uuid::new_v4(),
            },
            Arc::new(InMemoryWorkoutStore::new()),
            Arc::new(SystemClock),
            workout,
        )
        .await
        .unwrap();
        session
            .update_set_field(0, SetField::Weight(Some(100.0)))
            .unwrap();
        session.update_set_field(0, SetField::Reps(Some(5))).unwrap();
        session.complete_set(0).await.unwrap();
        Arc::new(Mutex::new(session))
    }

    #[tokio::test]
    async fn test_countdown_reports_each_tick_then_ends() {
        let session = resting_session(3).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _timer = spawn_rest_timer(session.clone(), tx, Duration::from_millis(5));

        assert_eq!(rx.recv().await, Some(ServerMessage::RestTick { remaining: 2 }));
        assert_eq!(rx.recv().await, Some(ServerMessage::RestTick { remaining: 1 }));
        assert_eq!(rx.recv().await, Some(ServerMessage::RestEnded));
        assert!(!session.lock().await.is_resting());
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_countdown() {
        let session = resting_session(60).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let timer = spawn_rest_timer(session.clone(), tx, Duration::from_millis(20));
        drop(timer);

        // The task owned the only sender, so the channel closes once it exits.
        assert_eq!(rx.recv().await, None);
        assert_eq!(session.lock().await.rest_remaining(), 60);
    }
}
