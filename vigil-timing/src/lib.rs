pub mod clock;
pub mod queue;
pub mod sleep;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use queue::{FiredTimer, TimerHandle, TimerQueue};
pub use sleep::precise_sleep;
