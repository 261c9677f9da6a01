pub mod record;
pub mod sink;

pub use record::{RunRecord, StimulusValue, TrialRow};
pub use sink::{ExternalSink, JsonFileSink, SinkError, submit_or_recover};
