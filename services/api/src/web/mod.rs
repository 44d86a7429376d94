pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod rest_timer;
pub mod session_task;
pub mod state;
pub mod ws_handler;

// Re-export the handlers the binary needs to build the web server router.
pub use middleware::require_auth;
pub use rest::{
    create_exercise_handler, create_workout_handler, get_workout_handler, list_exercises_handler,
    list_history_handler, list_session_sets_handler, list_workouts_handler,
};
pub use ws_handler::ws_handler;
