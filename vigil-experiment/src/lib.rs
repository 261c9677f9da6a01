pub mod config;
pub mod gate;
pub mod runner;
pub mod sequence;
pub mod state;

pub use config::{ConfigError, Group, RunConfig, RunMode, TimingConfig, TrialCounts};
pub use gate::ResponseGate;
pub use runner::run_to_completion;
pub use state::{RunState, TimerPurpose, TimerToken, TrialStateMachine};
