//! Seams to the infrastructure shared between scan processes.
//!
//! The shared key-value store and the publish/subscribe channel are owned
//! outside the scanner; this crate only names the primitives the scanner
//! relies on and ships in-memory implementations of them.
mod error;
pub use error::{BusError, StoreError};

pub mod kv;
pub use kv::{KvStore, MemoryStore};

pub mod bus;
pub use bus::{BusMessage, MemoryBus, MessageBus, Subscription};
