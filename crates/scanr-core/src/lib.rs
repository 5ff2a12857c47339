pub mod error;
pub use error::ControlError;

mod system;
pub use system::{arch, platform, set_vendor_version, start_message, vendor_version};

mod signals;
pub use signals::SignalMonitor;

mod process;
pub use process::{ProcessControl, SystemProcess};

mod collab;
pub use collab::{AttackContext, AttackNetwork, PluginCache};

pub mod controller;
pub use controller::{ControllerConfig, ScanController, stop_scan};
