//! Domain Layer
//!
//! Value objects, ports and events shared by the flusher and its adapters.
//!
//! - **Ports** (`ports.rs`) - `FileRecord`, `Population` and the trait
//!   abstractions for free-space probing and notifications
//! - **Events** (`events.rs`) - Run and drive events used for logging and
//!   notification messages

pub mod events;
pub mod ports;

pub use events::FlushEvent;
pub use ports::{FileRecord, FreeSpaceProbe, Notifier, Population};
