use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{DocumentKind, ReferenceType, ReservationStatus, StockingKey};

/// Notifications emitted after a posting transaction has committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    DocumentPosted {
        kind: DocumentKind,
        document_id: Uuid,
        document_number: String,
        ledger_entries: usize,
    },
    DocumentCancelled {
        kind: DocumentKind,
        document_id: Uuid,
        document_number: String,
    },
    ReservationCreated {
        reservation_id: Uuid,
        reference_type: ReferenceType,
        reference_id: Uuid,
        stocking_key: StockingKey,
        quantity: Decimal,
    },
    ReservationsClosed {
        reference_type: ReferenceType,
        reference_id: Uuid,
        status: ReservationStatus,
        count: usize,
        released_quantity: Decimal,
    },
    /// Physical stock fell below what is still reserved against it.
    StockBelowZeroAvailable {
        stocking_key: StockingKey,
        quantity: Decimal,
        reserved_quantity: Decimal,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::DocumentPosted { .. } => "document_posted",
            Event::DocumentCancelled { .. } => "document_cancelled",
            Event::ReservationCreated { .. } => "reservation_created",
            Event::ReservationsClosed { .. } => "reservations_closed",
            Event::StockBelowZeroAvailable { .. } => "stock_below_zero_available",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a bounded channel and returns both ends.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Best-effort send that never waits on a full channel. The stock change
    /// is already committed, so a dropped notification is only logged.
    pub fn publish(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.sender.try_send(event) {
            counter!("warehouse_ledger.events.dropped", 1, "event" => name);
            warn!(event = name, error = %e, "Dropping event notification");
        }
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.publish(event);
        }
    }
}

/// Drains the event channel, logging each notification until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("warehouse_ledger.events.processed", 1, "event" => event.name());

        match &event {
            Event::DocumentPosted {
                kind,
                document_id,
                document_number,
                ledger_entries,
            } => {
                info!(%kind, %document_id, %document_number, ledger_entries, "Document posted");
            }
            Event::DocumentCancelled {
                kind,
                document_id,
                document_number,
            } => {
                info!(%kind, %document_id, %document_number, "Document cancelled");
            }
            Event::ReservationCreated {
                reservation_id,
                reference_type,
                reference_id,
                stocking_key,
                quantity,
            } => {
                info!(
                    %reservation_id,
                    %reference_type,
                    %reference_id,
                    %stocking_key,
                    %quantity,
                    "Reservation created"
                );
            }
            Event::ReservationsClosed {
                reference_type,
                reference_id,
                status,
                count,
                released_quantity,
            } => {
                info!(
                    %reference_type,
                    %reference_id,
                    %status,
                    count,
                    %released_quantity,
                    "Reservations closed"
                );
            }
            Event::StockBelowZeroAvailable {
                stocking_key,
                quantity,
                reserved_quantity,
            } => {
                warn!(
                    %stocking_key,
                    %quantity,
                    %reserved_quantity,
                    "Available quantity is negative"
                );
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_receiver() {
        let (sender, mut rx) = EventSender::channel(4);
        sender.publish(Event::DocumentCancelled {
            kind: DocumentKind::StockAdjustment,
            document_id: Uuid::new_v4(),
            document_number: "ADJ-202401-00001".into(),
        });
        let event = rx.recv().await.expect("event");
        assert_eq!(event.name(), "document_cancelled");
    }

    #[tokio::test]
    async fn publish_on_full_channel_does_not_block() {
        let (sender, _rx) = EventSender::channel(1);
        for _ in 0..3 {
            sender.publish(Event::DocumentCancelled {
                kind: DocumentKind::StockTransfer,
                document_id: Uuid::new_v4(),
                document_number: "TRF-202401-00001".into(),
            });
        }
    }
}
