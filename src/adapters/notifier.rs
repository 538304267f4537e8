//! Notifier Adapters
//!
//! Implements the `Notifier` port with logging, in-memory and composite
//! backends.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::ports::Notifier;
use crate::error::Result;

/// Logging-based notifier.
///
/// Writes every notification message to the tracing log.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier {
    /// Whether to log messages at info level (true) or debug level (false)
    info_level: bool,
}

impl LoggingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a notifier that logs at info level.
    pub fn info_level() -> Self {
        Self { info_level: true }
    }

    /// Create a notifier that logs at debug level.
    pub fn debug_level() -> Self {
        Self { info_level: false }
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        if self.info_level {
            info!(notification = %message, "Notification");
        } else {
            debug!(notification = %message, "Notification");
        }
        Ok(())
    }
}

/// In-memory notifier for testing.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    messages: parking_lot::RwLock<Vec<String>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected messages.
    pub fn messages(&self) -> Vec<String> {
        self.messages.read().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    pub fn clear(&self) {
        self.messages.write().clear();
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        self.messages.write().push(message.to_string());
        Ok(())
    }
}

/// Composite notifier that delivers to multiple backends.
///
/// Every backend is tried; the first failure is returned.
#[derive(Default)]
pub struct CompositeNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl CompositeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a notifier to the composite.
    pub fn with_notifier<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.notifiers.push(Box::new(notifier));
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl std::fmt::Debug for CompositeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeNotifier")
            .field("notifier_count", &self.notifiers.len())
            .finish()
    }
}

#[async_trait]
impl Notifier for CompositeNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(message).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
