//! Progress events
//!
//! The harvester publishes what it is doing to an optional unbounded channel.
//! Subscribers consume the stream on their own schedule; a dropped receiver
//! never affects the harvest.

use crate::state::{FailureKind, HarvestPhase, HarvestStatus};
use tokio::sync::mpsc;

/// Something that happened during a harvest
#[derive(Debug, Clone, PartialEq)]
pub enum HarvestEvent {
    /// The session entered a new phase
    PhaseChanged { phase: HarvestPhase },

    /// The first page answered; `total_hint` is the server's record count, if any
    Probed { total_hint: Option<u64> },

    /// A page was appended to the table
    PageCompleted {
        offset: u64,
        records: usize,
        total_records: usize,
    },

    /// A page failed after retries
    PageFailed {
        offset: u64,
        kind: FailureKind,
        consecutive_failures: u32,
    },

    /// The harvest reached a terminal status
    Finished {
        status: HarvestStatus,
        total_records: usize,
    },
}

pub type EventSender = mpsc::UnboundedSender<HarvestEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<HarvestEvent>;

/// Creates a progress channel to hand to [`Harvester::with_events`](crate::harvest::Harvester::with_events)
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Publishing side held by a harvest session
#[derive(Debug, Clone, Default)]
pub(crate) struct EventPublisher {
    sender: Option<EventSender>,
}

impl EventPublisher {
    pub(crate) fn new(sender: Option<EventSender>) -> Self {
        Self { sender }
    }

    pub(crate) fn publish(&self, event: HarvestEvent) {
        if let Some(sender) = &self.sender {
            // A closed channel only means nobody is listening any more.
            let _ = sender.send(event);
        }
    }
}
