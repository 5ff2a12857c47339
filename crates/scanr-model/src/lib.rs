mod domain;
pub use domain::*;

pub mod keys;

mod error;
pub use error::PreferenceError;
