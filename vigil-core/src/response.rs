use serde::{Deserialize, Serialize};

/// The three recognized controls. Anything else is dropped at the input
/// boundary and never reaches the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Primary,
    SecondaryLeft,
    SecondaryRight,
}

/// One captured input, stamped with the run clock (monotonic nanoseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: ResponseKind,
    pub at_ns: u64,
}
