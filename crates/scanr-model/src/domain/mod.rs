mod preferences;
pub use preferences::{DEFAULT_PREFERENCES, Preferences};

mod limits;
pub use limits::ScanLimits;

mod scan_state;
pub use scan_state::ScanState;

mod envelope;
pub use envelope::{Envelope, GET_SCAN, ScanRef};

/// Identifier of a scan as handed over by the director.
pub type ScanId = String;
