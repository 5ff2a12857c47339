//! File access for scripts running under a scan.
//!
//! Every operation assumes the filesystem is shared with a hostile actor:
//! paths are checked with a non-following stat, opened without following
//! symlinks, and the opened descriptor is compared against the checked
//! identity before any byte is read or written.
mod error;
pub use error::{FsError, FsResult};

mod identity;
pub use identity::FileIdentity;

mod file;
pub use file::{delete_file, read_file, stat_size, write_file};

mod tmp;
pub use tmp::temp_directory;
