mod error;
pub use error::{ExecError, ExecResult};

mod slot;
pub use slot::{ExecutionSlot, SlotGuard};

mod args;
pub use args::Arg;

pub mod capture;
pub use capture::Executor;

mod util;
pub use util::find_in_path;

pub mod prelude {
    pub use crate::error::{ExecError, ExecResult};
    pub use crate::{Arg, Executor, ExecutionSlot, find_in_path};
}
