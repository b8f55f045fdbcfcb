pub mod checkpoint;
pub mod runner;
pub mod signal;
pub mod state;
pub mod summary;

pub use checkpoint::{CheckpointLoad, CheckpointRecord, CheckpointStore, RunDescriptor};
pub use runner::{Autopilot, RunOutcome, RunReport};
pub use signal::{ResumeSignal, StopSignal};
pub use state::{JobPhase, OrchestratorState};
pub use summary::{JobRow, JobStatus, render_table, tally};
