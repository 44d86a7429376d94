pub mod domain;
pub mod memory;
pub mod ports;
pub mod session;

pub use domain::{
    Exercise, ExercisePrescription, NewSession, SessionHistoryEntry, SessionSummary, SetEntry,
    SetField, SetRecord, User, UserContext, UserCredentials, WorkoutDefinition, WorkoutOverview,
    DEFAULT_REST_SECONDS,
};
pub use memory::InMemoryWorkoutStore;
pub use ports::{Clock, DatabaseService, PortError, PortResult, SystemClock, WorkoutStore};
pub use session::{ActiveWorkoutSession, Advance, SessionError, SessionPhase};
