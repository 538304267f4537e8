//! Infrastructure Adapters
//!
//! This module contains adapter implementations for the domain ports,
//! following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │            FreeSpaceProbe     │     Notifier               │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ StatvfsProbe │ PushoverNotifier │ LoggingNotifier         │ │
//! │  │ InMemoryNotifier │ CompositeNotifier                      │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cacheflush::adapters::{CompositeNotifier, LoggingNotifier, StatvfsProbe};
//! use cacheflush::domain::ports::FreeSpaceProbe;
//!
//! let free = StatvfsProbe::new().free_bytes(Path::new("/mnt/cache"))?;
//! let notifier = CompositeNotifier::new().with_notifier(LoggingNotifier::info_level());
//! ```

mod notifier;
mod pushover;
mod statvfs;

pub use notifier::{CompositeNotifier, InMemoryNotifier, LoggingNotifier};
pub use pushover::{PushoverConfig, PushoverNotifier, PUSHOVER_MESSAGES_URL};
pub use statvfs::StatvfsProbe;
