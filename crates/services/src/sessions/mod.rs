mod controller;
mod listeners;
mod standings;
mod timer;

// Public API of the session subsystem.
pub use controller::{
    Completion, ControllerSettings, EnterOutcome, MIN_TICK_PERIOD, SessionController,
    SharedController,
};
pub use listeners::{ListenerRegistry, SessionEvent, Subscription};
pub use standings::{LeaderboardStandings, StandingRow, TOP_N};
pub use timer::QuizTimer;
