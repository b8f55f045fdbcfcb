//! CLI command implementations.
//!
//! | Module   | Commands handled                      |
//! |----------|---------------------------------------|
//! | `run`    | `Run`, `Plan`                         |
//! | `state`  | `Status`, `ResumeSignal`, `Reset`     |
//! | `config` | `Config`                              |

pub mod config;
pub mod run;
pub mod state;

pub use config::cmd_config;
pub use run::{cmd_plan, cmd_run};
pub use state::{cmd_reset, cmd_resume_signal, cmd_status};
