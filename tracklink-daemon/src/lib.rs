//! Background runtime: periodic sync passes, log file handling and the
//! last-pass record read by `tracklink status`.

mod error;
pub mod log_rotation;
pub mod paths;
mod runtime;
pub mod state;

pub use error::DaemonError;
pub use runtime::{init_tracing, run, run_loop, start_blocking, DaemonOptions};
pub use state::{read_last_pass_at, write_last_pass_at, LastPass};
