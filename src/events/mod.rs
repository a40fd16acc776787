use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::{DocumentStatus, MaterialStatus};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn publish(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "Dropping domain event");
        }
    }
}

/// Domain events emitted by the P2P and material services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    MaterialCreated {
        material_number: String,
    },
    MaterialStatusChanged {
        material_number: String,
        old_status: MaterialStatus,
        new_status: MaterialStatus,
    },
    MaterialDeleted {
        material_number: String,
    },
    RequisitionCreated {
        document_number: String,
        total_value: Decimal,
    },
    RequisitionStatusChanged {
        document_number: String,
        old_status: DocumentStatus,
        new_status: DocumentStatus,
    },
    RequisitionDeleted {
        document_number: String,
    },
    OrderCreated {
        document_number: String,
        vendor: String,
        requisition_reference: Option<String>,
        total_value: Decimal,
    },
    OrderStatusChanged {
        document_number: String,
        old_status: DocumentStatus,
        new_status: DocumentStatus,
    },
    OrderReceived {
        document_number: String,
        received_items: Vec<u32>,
        at: DateTime<Utc>,
    },
    OrderDeleted {
        document_number: String,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::MaterialCreated { .. } => "material_created",
            Event::MaterialStatusChanged { .. } => "material_status_changed",
            Event::MaterialDeleted { .. } => "material_deleted",
            Event::RequisitionCreated { .. } => "requisition_created",
            Event::RequisitionStatusChanged { .. } => "requisition_status_changed",
            Event::RequisitionDeleted { .. } => "requisition_deleted",
            Event::OrderCreated { .. } => "order_created",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::OrderReceived { .. } => "order_received",
            Event::OrderDeleted { .. } => "order_deleted",
        }
    }
}

pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        crate::metrics::record_event(event.name());

        match &event {
            Event::RequisitionStatusChanged {
                document_number,
                old_status,
                new_status,
            } => {
                info!(%document_number, %old_status, %new_status, "Requisition status changed");
            }
            Event::OrderStatusChanged {
                document_number,
                old_status,
                new_status,
            } => {
                info!(%document_number, %old_status, %new_status, "Order status changed");
            }
            Event::OrderReceived {
                document_number,
                received_items,
                ..
            } => {
                info!(%document_number, items = ?received_items, "Goods receipt posted");
            }
            Event::MaterialStatusChanged {
                material_number,
                old_status,
                new_status,
            } => {
                info!(%material_number, %old_status, %new_status, "Material status changed");
            }
            other => {
                info!(event = other.name(), payload = ?other, "Domain event");
            }
        }
    }

    info!("Event channel closed, stopping event processing loop");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_events_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::MaterialCreated {
                material_number: "RAW00001".into(),
            })
            .await
            .unwrap();
        sender
            .publish(Event::OrderDeleted {
                document_number: "PO000001".into(),
            })
            .await;

        assert_eq!(rx.recv().await.unwrap().name(), "material_created");
        assert_eq!(rx.recv().await.unwrap().name(), "order_deleted");
    }

    #[tokio::test]
    async fn publish_on_closed_channel_does_not_fail() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender
            .send(Event::RequisitionDeleted {
                document_number: "PR000001".into()
            })
            .await
            .is_err());
        sender
            .publish(Event::RequisitionDeleted {
                document_number: "PR000001".into(),
            })
            .await;
    }
}
