mod discard;
mod exec;
mod multi;

pub use discard::{discard, DiscardArguments};
pub use exec::{drain_push_waiters, run_queued_commands, ExecArguments};
pub use multi::{multi, MultiArguments};
