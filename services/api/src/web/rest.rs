//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{auth, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;
use workout_core::{
    Exercise, ExercisePrescription, PortError, SessionHistoryEntry, SetRecord, WorkoutDefinition,
    WorkoutOverview,
};

/// Upper bounds accepted by the workout builder.
pub const MAX_SETS_PER_EXERCISE: u32 = 20;
pub const MAX_REST_SECONDS: u32 = 3600;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        list_exercises_handler,
        create_exercise_handler,
        list_workouts_handler,
        create_workout_handler,
        get_workout_handler,
        list_history_handler,
        list_session_sets_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            ExerciseResponse,
            CreateExerciseRequest,
            PrescriptionPayload,
            PrescriptionResponse,
            CreateWorkoutRequest,
            WorkoutResponse,
            WorkoutOverviewResponse,
            HistoryEntryResponse,
            SetRecordResponse,
        )
    ),
    tags(
        (name = "Workout Tracker API", description = "Exercise library, workout builder and workout history.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ExerciseResponse {
    id: Uuid,
    name: String,
    muscle_group: Option<String>,
    equipment: Option<String>,
}

impl From<Exercise> for ExerciseResponse {
    fn from(e: Exercise) -> Self {
        Self {
            id: e.id,
            name: e.name,
            muscle_group: e.muscle_group,
            equipment: e.equipment,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateExerciseRequest {
    pub name: String,
    pub muscle_group: Option<String>,
    pub equipment: Option<String>,
}

/// One exercise of a workout being built.
#[derive(Deserialize, ToSchema, Clone)]
pub struct PrescriptionPayload {
    pub exercise_id: Uuid,
    pub set_count: u32,
    pub target_reps: Option<u32>,
    pub rest_seconds: Option<u32>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateWorkoutRequest {
    pub name: String,
    pub exercises: Vec<PrescriptionPayload>,
}

#[derive(Serialize, ToSchema)]
pub struct PrescriptionResponse {
    exercise_id: Uuid,
    name: String,
    set_count: u32,
    target_reps: Option<u32>,
    rest_seconds: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct WorkoutResponse {
    id: Uuid,
    name: String,
    exercises: Vec<PrescriptionResponse>,
}

impl From<WorkoutDefinition> for WorkoutResponse {
    fn from(w: WorkoutDefinition) -> Self {
        Self {
            id: w.id,
            name: w.name,
            exercises: w
                .exercises
                .into_iter()
                .map(|p| PrescriptionResponse {
                    exercise_id: p.exercise_id,
                    name: p.name,
                    set_count: p.set_count,
                    target_reps: p.target_reps,
                    rest_seconds: p.rest_seconds,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct WorkoutOverviewResponse {
    id: Uuid,
    name: String,
    exercise_count: usize,
    created_at: DateTime<Utc>,
}

impl From<WorkoutOverview> for WorkoutOverviewResponse {
    fn from(w: WorkoutOverview) -> Self {
        Self {
            id: w.id,
            name: w.name,
            exercise_count: w.exercise_count,
            created_at: w.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HistoryEntryResponse {
    session_id: Uuid,
    workout_id: Uuid,
    workout_name: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    duration_minutes: Option<i64>,
    sets_recorded: i64,
    /// False for sessions that were abandoned before finishing.
    finished: bool,
}

impl From<SessionHistoryEntry> for HistoryEntryResponse {
    fn from(h: SessionHistoryEntry) -> Self {
        Self {
            session_id: h.session_id,
            workout_id: h.workout_id,
            workout_name: h.workout_name,
            started_at: h.started_at,
            finished: h.completed_at.is_some(),
            completed_at: h.completed_at,
            duration_minutes: h.duration_minutes,
            sets_recorded: h.sets_recorded,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SetRecordResponse {
    exercise_id: Uuid,
    exercise_name: String,
    set_number: u32,
    weight: Option<f64>,
    reps: Option<u32>,
    rpe: Option<u8>,
    completed: bool,
}

impl From<SetRecord> for SetRecordResponse {
    fn from(s: SetRecord) -> Self {
        Self {
            exercise_id: s.exercise_id,
            exercise_name: s.exercise_name,
            set_number: s.set_number,
            weight: s.weight,
            reps: s.reps,
            rpe: s.rpe,
            completed: s.completed,
        }
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Maps a port failure to the status a client should see.
fn port_failure(e: PortError, action: &str) -> (StatusCode, String) {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        PortError::Conflict(what) => (StatusCode::CONFLICT, format!("{} already exists", what)),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(msg) => {
            error!("Failed to {}: {}", action, msg);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to {}", action))
        }
    }
}

/// Checks a workout-builder request against the exercise library and turns it
/// into prescriptions, copying each exercise's current name.
pub fn build_prescriptions(
    req: &CreateWorkoutRequest,
    library: &[Exercise],
) -> Result<Vec<ExercisePrescription>, String> {
    if req.name.trim().is_empty() {
        return Err("Workout name must not be empty".to_string());
    }
    if req.exercises.is_empty() {
        return Err("A workout needs at least one exercise".to_string());
    }

    let names: HashMap<Uuid, &str> = library.iter().map(|e| (e.id, e.name.as_str())).collect();
    req.exercises
        .iter()
        .enumerate()
        .map(|(position, p)| {
            let name = names
                .get(&p.exercise_id)
                .ok_or_else(|| format!("Unknown exercise {}", p.exercise_id))?;
            if p.set_count == 0 || p.set_count > MAX_SETS_PER_EXERCISE {
                return Err(format!(
                    "Exercise {} must have between 1 and {} sets",
                    position + 1,
                    MAX_SETS_PER_EXERCISE
                ));
            }
            if p.rest_seconds.is_some_and(|r| r > MAX_REST_SECONDS) {
                return Err(format!(
                    "Exercise {} rest may not exceed {} seconds",
                    position + 1,
                    MAX_REST_SECONDS
                ));
            }
            Ok(ExercisePrescription {
                exercise_id: p.exercise_id,
                name: name.to_string(),
                set_count: p.set_count,
                target_reps: p.target_reps,
                rest_seconds: p.rest_seconds,
            })
        })
        .collect()
}

//=========================================================================================
// Exercise Library
//=========================================================================================

/// List every exercise in the library.
#[utoipa::path(
    get,
    path = "/exercises",
    responses(
        (status = 200, description = "Exercise library", body = [ExerciseResponse]),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_exercises_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let exercises = app_state
        .db
        .list_exercises()
        .await
        .map_err(|e| port_failure(e, "list exercises"))?;
    let body: Vec<ExerciseResponse> = exercises.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Add an exercise to the library.
#[utoipa::path(
    post,
    path = "/exercises",
    request_body = CreateExerciseRequest,
    responses(
        (status = 201, description = "Exercise created", body = ExerciseResponse),
        (status = 400, description = "Missing name"),
        (status = 409, description = "An exercise with that name exists")
    )
)]
pub async fn create_exercise_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<CreateExerciseRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Exercise name must not be empty".to_string()));
    }
    let exercise = app_state
        .db
        .create_exercise(name, req.muscle_group.as_deref(), req.equipment.as_deref())
        .await
        .map_err(|e| port_failure(e, "create exercise"))?;
    Ok((StatusCode::CREATED, Json(ExerciseResponse::from(exercise))))
}

//=========================================================================================
// Workout Builder
//=========================================================================================

/// List the caller's workouts, newest first.
#[utoipa::path(
    get,
    path = "/workouts",
    responses(
        (status = 200, description = "The user's workouts", body = [WorkoutOverviewResponse])
    )
)]
pub async fn list_workouts_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let workouts = app_state
        .db
        .list_workouts(user_id)
        .await
        .map_err(|e| port_failure(e, "list workouts"))?;
    let body: Vec<WorkoutOverviewResponse> = workouts.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Create a workout from exercises of the library.
#[utoipa::path(
    post,
    path = "/workouts",
    request_body = CreateWorkoutRequest,
    responses(
        (status = 201, description = "Workout created", body = WorkoutResponse),
        (status = 400, description = "Invalid workout")
    )
)]
pub async fn create_workout_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateWorkoutRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let library = app_state
        .db
        .list_exercises()
        .await
        .map_err(|e| port_failure(e, "load exercises"))?;
    let prescriptions =
        build_prescriptions(&req, &library).map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;

    let workout = app_state
        .db
        .create_workout(user_id, req.name.trim(), &prescriptions)
        .await
        .map_err(|e| port_failure(e, "create workout"))?;
    info!("User {} created workout {}", user_id, workout.id);

    Ok((StatusCode::CREATED, Json(WorkoutResponse::from(workout))))
}

/// Fetch one of the caller's workouts with its prescriptions in order.
#[utoipa::path(
    get,
    path = "/workouts/{id}",
    params(("id" = Uuid, Path, description = "Workout id")),
    responses(
        (status = 200, description = "The workout", body = WorkoutResponse),
        (status = 404, description = "No such workout for this user")
    )
)]
pub async fn get_workout_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(workout_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let workout = app_state
        .db
        .get_workout(user_id, workout_id)
        .await
        .map_err(|e| port_failure(e, "load workout"))?;
    Ok(Json(WorkoutResponse::from(workout)))
}

//=========================================================================================
// History
//=========================================================================================

/// List the caller's sessions, newest first, including unfinished ones.
#[utoipa::path(
    get,
    path = "/history",
    responses(
        (status = 200, description = "Past sessions", body = [HistoryEntryResponse])
    )
)]
pub async fn list_history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let sessions = app_state
        .db
        .list_sessions(user_id)
        .await
        .map_err(|e| port_failure(e, "list history"))?;
    let body: Vec<HistoryEntryResponse> = sessions.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// List the sets recorded during one of the caller's sessions.
#[utoipa::path(
    get,
    path = "/history/{session_id}/sets",
    params(("session_id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Recorded sets", body = [SetRecordResponse]),
        (status = 404, description = "No such session for this user")
    )
)]
pub async fn list_session_sets_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let sets = app_state
        .db
        .get_session_sets(user_id, session_id)
        .await
        .map_err(|e| port_failure(e, "load session sets"))?;
    let body: Vec<SetRecordResponse> = sets.into_iter().map(Into::into).collect();
    Ok(Json(body))
}
