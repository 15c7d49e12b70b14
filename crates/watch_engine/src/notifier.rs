use watch_core::{ChangeEvent, MessageFormatter};
use watch_logging::watch_warn;

use crate::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
    /// Nothing was sent: the event has no message (`Unchanged`).
    Suppressed,
}

/// Formats change events and hands them to a transport.
pub struct Notifier<'a> {
    formatter: &'a MessageFormatter,
    transport: &'a dyn Transport,
}

impl<'a> Notifier<'a> {
    pub fn new(formatter: &'a MessageFormatter, transport: &'a dyn Transport) -> Self {
        Self {
            formatter,
            transport,
        }
    }

    /// Transport errors come back as `Failed`; they never propagate.
    pub async fn deliver(&self, event: &ChangeEvent) -> DeliveryOutcome {
        let Some(text) = self.formatter.format(event) else {
            return DeliveryOutcome::Suppressed;
        };
        match self.transport.send(&text).await {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(err) => {
                watch_warn!(
                    "Notification for {} ({:?}) failed: {}",
                    event.listing_id(),
                    event.kind(),
                    err
                );
                DeliveryOutcome::Failed(err.to_string())
            }
        }
    }
}
