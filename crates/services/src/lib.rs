#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod remote_bank;
pub mod sessions;

pub use quiz_core::Clock;

pub use app_services::QuizServices;
pub use error::{InvalidOperation, LoadError, QuizError, QuizServicesError, RemoteBankError};
pub use remote_bank::{RemoteBankConfig, RemoteQuestionBank};
pub use sessions::{
    Completion, ControllerSettings, EnterOutcome, LeaderboardStandings, MIN_TICK_PERIOD,
    QuizTimer, SessionController, SessionEvent, SharedController, Subscription,
};
