//! Process management utilities.

mod control;
mod inspect;
mod shell;

pub use control::{force_kill, is_process_alive, wait_for_exit};
pub use inspect::{find_pid, parse_pid, ProcessPattern, PROCESS_LISTING_COMMAND};
pub use shell::{exec, shell_quote, spawn_detached, CommandOutput, LaunchHandle};
