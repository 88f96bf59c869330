//! External command execution.
//!
//! - [`CommandSpec`]: what to run (program, arguments, environment, directory, account)
//! - [`CommandRunner`]: how to run it; [`SystemRunner`] spawns real processes
//! - [`LoggedRunner`]: run-log decorator providing `run_and_check`

mod command_builder;
mod runner;

pub use command_builder::{CommandSpec, SUDO};
pub use runner::{
    CommandOutput, CommandRunner, DiscardOutput, EXIT_COMMAND_NOT_FOUND, LoggedRunner,
    OutputSink, SystemRunner,
};
