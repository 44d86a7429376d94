//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use workout_core::ports::{Clock, DatabaseService, WorkoutStore};

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    /// The persistence side of active workouts. Usually the same adapter as `db`.
    pub store: Arc<dyn WorkoutStore>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
}
