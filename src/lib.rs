//! Resumable job autopilot.
//!
//! Pushes a queue of jobs through `plan → create → wait → master_export`,
//! checkpointing after every transition, pausing for an operator on blocking
//! conditions, and optionally planning each job from several scored
//! candidates.

pub mod audit;
pub mod config;
pub mod errors;
pub mod executor;
pub mod orchestrator;
pub mod phase2;
pub mod pilot_config;
pub mod planner;
pub mod spec;
pub mod telemetry;
pub mod ui;
