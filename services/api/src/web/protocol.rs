//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the app and the API server
//! for an active workout.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use workout_core::{ActiveWorkoutSession, SessionSummary, SetEntry, SetField};

/// Highest accepted rate of perceived exertion.
pub const MAX_RPE: u8 = 10;

//=========================================================================================
// Messages Sent FROM the Client (App) TO the Server
//=========================================================================================

/// The editable inputs of a set, as named on the wire.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SetFieldName {
    Weight,
    Reps,
    Rpe,
}

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts a session for one of the user's workouts. Must be the first message.
    Start { workout_id: Uuid },

    /// Sets or clears one input of a set. `null` clears it.
    UpdateSetField {
        set_index: usize,
        field: SetFieldName,
        value: Option<f64>,
    },

    CompleteSet { set_index: usize },

    SkipRest,

    ExtendRest { seconds: u32 },

    /// Moves to the next exercise, or finishes after the last one.
    AdvanceExercise,

    Finish,

    /// Abandons the session without finalizing it.
    Abort,
}

/// Converts a wire value into a typed set field.
///
/// Weight takes any non-negative number. Reps and RPE must be whole numbers,
/// and RPE may not exceed `MAX_RPE`.
pub fn to_set_field(field: SetFieldName, value: Option<f64>) -> Result<SetField, String> {
    let Some(value) = value else {
        return Ok(match field {
            SetFieldName::Weight => SetField::Weight(None),
            SetFieldName::Reps => SetField::Reps(None),
            SetFieldName::Rpe => SetField::Rpe(None),
        });
    };
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{:?} must be a non-negative number", field).to_lowercase());
    }
    match field {
        SetFieldName::Weight => Ok(SetField::Weight(Some(value))),
        SetFieldName::Reps => whole(value, u32::MAX as f64)
            .map(|reps| SetField::Reps(Some(reps as u32)))
            .ok_or_else(|| "reps must be a whole number".to_string()),
        SetFieldName::Rpe => whole(value, MAX_RPE as f64)
            .map(|rpe| SetField::Rpe(Some(rpe as u8)))
            .ok_or_else(|| format!("rpe must be a whole number between 0 and {}", MAX_RPE)),
    }
}

fn whole(value: f64, max: f64) -> Option<f64> {
    (value.fract() == 0.0 && value <= max).then_some(value)
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (App)
//=========================================================================================

/// One set as shown on the active-workout screen.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SetView {
    pub set_number: u32,
    pub exercise_name: String,
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub rpe: Option<u8>,
    pub completed: bool,
    pub target_reps: Option<u32>,
    pub rest_seconds: Option<u32>,
}

impl From<&SetEntry> for SetView {
    fn from(entry: &SetEntry) -> Self {
        Self {
            set_number: entry.set_number,
            exercise_name: entry.exercise_name.clone(),
            weight: entry.weight,
            reps: entry.reps,
            rpe: entry.rpe,
            completed: entry.completed,
            target_reps: entry.target_reps,
            rest_seconds: entry.rest_seconds,
        }
    }
}

/// Everything the client needs to redraw the active-workout screen.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub workout_name: String,
    pub exercise_index: usize,
    pub exercise_count: usize,
    pub exercise_name: String,
    pub sets: Vec<SetView>,
    pub rest_remaining: u32,
    pub is_resting: bool,
}

impl SessionSnapshot {
    pub fn of(session: &ActiveWorkoutSession) -> Self {
        Self {
            session_id: session.session_id(),
            workout_name: session.workout().name.clone(),
            exercise_index: session.current_exercise_index(),
            exercise_count: session.workout().exercises.len(),
            exercise_name: session.current_exercise().name.clone(),
            sets: session.sets().iter().map(SetView::from).collect(),
            rest_remaining: session.rest_remaining(),
            is_resting: session.is_resting(),
        }
    }
}

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session was created in the store.
    SessionStarted {
        session_id: Uuid,
        snapshot: SessionSnapshot,
    },

    /// The state after any accepted change.
    State { snapshot: SessionSnapshot },

    /// Sent once per elapsed rest second.
    RestTick { remaining: u32 },

    RestEnded,

    /// The session was finalized. The connection closes afterwards.
    Finished {
        session_id: Uuid,
        workout_name: String,
        duration_minutes: i64,
        sets_completed: usize,
    },

    Aborted,

    /// A rejected operation. The session stays usable so the client can retry.
    Error { message: String },
}

impl From<SessionSummary> for ServerMessage {
    fn from(summary: SessionSummary) -> Self {
        ServerMessage::Finished {
            session_id: summary.session_id,
            workout_name: summary.workout_name,
            duration_minutes: summary.duration_minutes,
            sets_completed: summary.sets_completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_decode_from_tagged_json() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"update_set_field","set_index":2,"field":"weight","value":102.5}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::UpdateSetField {
                set_index,
                field,
                value,
            } => {
                assert_eq!(set_index, 2);
                assert_eq!(field, SetFieldName::Weight);
                assert_eq!(value, Some(102.5));
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"update_set_field","set_index":0,"field":"reps","value":null}"#)
                .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::UpdateSetField { value: None, .. }
        ));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"skip_rest"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::SkipRest));
    }

    #[test]
    fn test_to_set_field_converts_whole_numbers() {
        assert_eq!(
            to_set_field(SetFieldName::Reps, Some(8.0)).unwrap(),
            SetField::Reps(Some(8))
        );
        assert_eq!(
            to_set_field(SetFieldName::Rpe, Some(10.0)).unwrap(),
            SetField::Rpe(Some(10))
        );
        assert_eq!(
            to_set_field(SetFieldName::Weight, Some(62.5)).unwrap(),
            SetField::Weight(Some(62.5))
        );
        assert_eq!(
            to_set_field(SetFieldName::Weight, None).unwrap(),
            SetField::Weight(None)
        );
    }

    #[test]
    fn test_to_set_field_rejects_bad_values() {
        assert!(to_set_field(SetFieldName::Reps, Some(7.5)).is_err());
        assert!(to_set_field(SetFieldName::Rpe, Some(11.0)).is_err());
        assert!(to_set_field(SetFieldName::Weight, Some(-5.0)).is_err());
        assert!(to_set_field(SetFieldName::Weight, Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMessage::RestTick { remaining: 42 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "rest_tick", "remaining": 42}));

        let json = serde_json::to_value(ServerMessage::RestEnded).unwrap();
        assert_eq!(json, serde_json::json!({"type": "rest_ended"}));
    }
}
