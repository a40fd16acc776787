use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, instrument};
use validator::Validate;

use crate::{
    errors::{ServiceError, ServiceResult},
    events::{Event, EventSender},
    metrics,
    models::{
        CreateOrderRequest, CreateRequisitionRequest, DocumentItemStatus, DocumentStatus, Order,
        OrderFilter, OrderItem, OrderItemInput, Requisition, RequisitionFilter,
        RequisitionItemInput, UpdateOrderRequest, UpdateRequisitionRequest,
    },
    services::{materials::MaterialService, p2p_rules as rules},
    store::StateManager,
};

const REQUISITION: &str = rules::REQUISITION_KIND;
const ORDER: &str = rules::ORDER_KIND;

fn validate_inputs<T: Validate>(items: &[T]) -> ServiceResult<()> {
    for item in items {
        item.validate()?;
    }
    Ok(())
}

/// Facade over requisitions and purchase orders.
///
/// Every mutation loads the document under the store's entry lock, runs the
/// rule for the requested transition and only then commits.
#[derive(Clone)]
pub struct P2PService {
    store: Arc<StateManager>,
    materials: Arc<MaterialService>,
    events: Option<Arc<EventSender>>,
}

impl P2PService {
    pub fn new(
        store: Arc<StateManager>,
        materials: Arc<MaterialService>,
        events: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            store,
            materials,
            events,
        }
    }

    async fn publish(&self, event: Event) {
        if let Some(events) = &self.events {
            events.publish(event).await;
        }
    }

    async fn requisition_status_changed(
        &self,
        document_number: &str,
        old_status: DocumentStatus,
        new_status: DocumentStatus,
    ) {
        info!(document_number, %old_status, %new_status, "Requisition status changed");
        metrics::record_status_transition("requisition", new_status);
        self.publish(Event::RequisitionStatusChanged {
            document_number: document_number.to_string(),
            old_status,
            new_status,
        })
        .await;
    }

    async fn order_status_changed(
        &self,
        document_number: &str,
        old_status: DocumentStatus,
        new_status: DocumentStatus,
    ) {
        info!(document_number, %old_status, %new_status, "Order status changed");
        metrics::record_status_transition("order", new_status);
        self.publish(Event::OrderStatusChanged {
            document_number: document_number.to_string(),
            old_status,
            new_status,
        })
        .await;
    }

    fn check_requisition_items(&self, items: &[RequisitionItemInput]) -> ServiceResult<()> {
        validate_inputs(items)?;
        rules::validate_unique_item_numbers(items.iter().map(|i| i.item_number))?;
        self.materials
            .ensure_all_active(items.iter().filter_map(|i| i.material_number.as_deref()))
    }

    fn check_order_items(&self, items: &[OrderItemInput]) -> ServiceResult<()> {
        validate_inputs(items)?;
        rules::validate_unique_item_numbers(items.iter().map(|i| i.item_number))?;
        self.materials
            .ensure_all_active(items.iter().filter_map(|i| i.material_number.as_deref()))
    }

    // Requisitions

    #[instrument(skip(self))]
    pub async fn get_requisition(&self, document_number: &str) -> ServiceResult<Requisition> {
        self.store.requisitions.get(document_number)
    }

    #[instrument(skip(self))]
    pub async fn list_requisitions(&self, filter: &RequisitionFilter) -> Vec<Requisition> {
        self.store
            .requisitions
            .list()
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect()
    }

    #[instrument(skip(self, request), fields(requester = %request.requester))]
    pub async fn create_requisition(
        &self,
        request: CreateRequisitionRequest,
    ) -> ServiceResult<Requisition> {
        request.validate()?;
        self.check_requisition_items(&request.items)?;

        let document_number = match request.document_number {
            Some(number) => number.trim().to_string(),
            None => self.store.next_requisition_number(),
        };
        let now = Utc::now();
        let mut requisition = Requisition {
            document_number,
            description: request.description,
            requester: request.requester,
            department: request.department,
            procurement_type: request.procurement_type,
            notes: request.notes,
            items: request
                .items
                .into_iter()
                .map(RequisitionItemInput::into_item)
                .collect(),
            status: DocumentStatus::Draft,
            total_value: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        requisition.touch()?;

        let created = self.store.requisitions.insert(requisition)?;
        info!(document_number = %created.document_number, "Requisition created");
        metrics::record_document_created("requisition");
        self.publish(Event::RequisitionCreated {
            document_number: created.document_number.clone(),
            total_value: created.total_value,
        })
        .await;
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update_requisition(
        &self,
        document_number: &str,
        request: UpdateRequisitionRequest,
    ) -> ServiceResult<Requisition> {
        request.validate()?;
        if let Some(items) = &request.items {
            self.check_requisition_items(items)?;
        }

        let mut status_change = None;
        let updated = self.store.requisitions.update(document_number, |req| {
            if request.items.is_some() && req.status != DocumentStatus::Draft {
                return Err(ServiceError::validation(
                    "Cannot update items after requisition is submitted",
                )
                .with_detail("document_number", req.document_number.as_str())
                .with_detail("current_status", req.status.to_string()));
            }
            if let Some(description) = request.description {
                req.description = description;
            }
            if let Some(requester) = request.requester {
                req.requester = requester;
            }
            if let Some(department) = request.department {
                req.department = Some(department);
            }
            if let Some(procurement_type) = request.procurement_type {
                req.procurement_type = procurement_type;
            }
            if let Some(notes) = request.notes {
                req.notes = Some(notes);
            }
            if let Some(items) = request.items {
                req.items = items.into_iter().map(RequisitionItemInput::into_item).collect();
            }
            if let Some(status) = request.status.filter(|s| *s != req.status) {
                rules::ensure_update_status(REQUISITION, &req.document_number, req.status, status)?;
                rules::ensure_transition(
                    REQUISITION,
                    &req.document_number,
                    req.status,
                    status,
                    rules::is_valid_requisition_transition,
                )?;
                if status == DocumentStatus::Submitted {
                    rules::validate_requisition_items(&req.items)?;
                }
                status_change = Some((req.status, status));
                req.status = status;
            }
            req.touch()?;
            Ok(())
        })?;

        if let Some((old, new)) = status_change {
            self.requisition_status_changed(&updated.document_number, old, new)
                .await;
        }
        Ok(updated)
    }

    async fn transition_requisition<F>(
        &self,
        document_number: &str,
        action: &str,
        allowed: &[DocumentStatus],
        to: DocumentStatus,
        apply: F,
    ) -> ServiceResult<Requisition>
    where
        F: FnOnce(&mut Requisition) -> ServiceResult<()>,
    {
        let mut old_status = to;
        let updated = self.store.requisitions.update(document_number, |req| {
            rules::require_status(REQUISITION, &req.document_number, req.status, allowed, action)?;
            rules::ensure_transition(
                REQUISITION,
                &req.document_number,
                req.status,
                to,
                rules::is_valid_requisition_transition,
            )?;
            apply(req)?;
            old_status = req.status;
            req.status = to;
            req.touch()?;
            Ok(())
        })?;
        self.requisition_status_changed(&updated.document_number, old_status, to)
            .await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn submit_requisition(&self, document_number: &str) -> ServiceResult<Requisition> {
        self.transition_requisition(
            document_number,
            "submit",
            &[DocumentStatus::Draft],
            DocumentStatus::Submitted,
            |req| rules::validate_requisition_items(&req.items),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn approve_requisition(&self, document_number: &str) -> ServiceResult<Requisition> {
        self.transition_requisition(
            document_number,
            "approve",
            &[DocumentStatus::Submitted],
            DocumentStatus::Approved,
            |_| Ok(()),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn reject_requisition(
        &self,
        document_number: &str,
        reason: &str,
    ) -> ServiceResult<Requisition> {
        let reason = rules::require_reason(reason, "reject a requisition")?;
        self.transition_requisition(
            document_number,
            "reject",
            &[DocumentStatus::Submitted],
            DocumentStatus::Rejected,
            |req| {
                let note = format!("REJECTED: {}", reason);
                req.notes = Some(rules::append_note(req.notes.as_deref(), &note));
                Ok(())
            },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_requisition(&self, document_number: &str) -> ServiceResult<()> {
        self.store.requisitions.remove_if(document_number, |req| {
            rules::require_status(
                REQUISITION,
                &req.document_number,
                req.status,
                rules::REQUISITION_DELETABLE,
                "delete",
            )
        })?;
        info!(document_number, "Requisition deleted");
        metrics::record_document_deleted("requisition");
        self.publish(Event::RequisitionDeleted {
            document_number: document_number.to_string(),
        })
        .await;
        Ok(())
    }

    // Orders

    #[instrument(skip(self))]
    pub async fn get_order(&self, document_number: &str) -> ServiceResult<Order> {
        self.store.orders.get(document_number)
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self, filter: &OrderFilter) -> Vec<Order> {
        self.store
            .orders
            .list()
            .into_iter()
            .filter(|o| filter.matches(o))
            .collect()
    }

    async fn insert_order(&self, order: Order) -> ServiceResult<Order> {
        let created = self.store.orders.insert(order)?;
        info!(
            document_number = %created.document_number,
            vendor = %created.vendor,
            "Order created"
        );
        metrics::record_document_created("order");
        self.publish(Event::OrderCreated {
            document_number: created.document_number.clone(),
            vendor: created.vendor.clone(),
            requisition_reference: created.requisition_reference.clone(),
            total_value: created.total_value,
        })
        .await;
        Ok(created)
    }

    #[instrument(skip(self, request), fields(vendor = %request.vendor))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> ServiceResult<Order> {
        request.validate()?;
        rules::validate_vendor(&request.vendor)?;
        self.check_order_items(&request.items)?;

        let document_number = match request.document_number {
            Some(number) => number.trim().to_string(),
            None => self.store.next_order_number(),
        };
        let now = Utc::now();
        let mut order = Order {
            document_number,
            description: request.description,
            requester: request.requester,
            vendor: request.vendor.trim().to_string(),
            payment_terms: request.payment_terms,
            requisition_reference: request.requisition_reference,
            procurement_type: request.procurement_type,
            notes: request.notes,
            items: request
                .items
                .into_iter()
                .map(OrderItemInput::into_item)
                .collect(),
            status: DocumentStatus::Draft,
            total_value: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        order.touch()?;
        self.insert_order(order).await
    }

    /// Converts an approved requisition into a draft order and marks the
    /// requisition ORDERED. The order is removed again if the requisition
    /// cannot be marked.
    #[instrument(skip(self))]
    pub async fn create_order_from_requisition(
        &self,
        requisition_number: &str,
        vendor: &str,
        payment_terms: Option<String>,
    ) -> ServiceResult<Order> {
        rules::validate_vendor(vendor)?;
        let requisition = self.store.requisitions.get(requisition_number)?;
        rules::require_status(
            REQUISITION,
            &requisition.document_number,
            requisition.status,
            &[DocumentStatus::Approved],
            "create order from",
        )?;
        rules::validate_requisition_items(&requisition.items)?;

        let now = Utc::now();
        let mut order = Order {
            document_number: self.store.next_order_number(),
            description: requisition.description.clone(),
            requester: requisition.requester.clone(),
            vendor: vendor.trim().to_string(),
            payment_terms,
            requisition_reference: Some(requisition.document_number.clone()),
            procurement_type: requisition.procurement_type,
            notes: requisition.notes.clone(),
            items: requisition
                .items
                .iter()
                .map(|item| OrderItem {
                    item_number: item.item_number,
                    material_number: item.material_number.clone(),
                    description: item.description.clone(),
                    quantity: item.quantity,
                    unit: item.unit,
                    price: item.price,
                    received_quantity: Decimal::ZERO,
                    status: DocumentItemStatus::Open,
                    requisition_reference: Some(requisition.document_number.clone()),
                    requisition_item: Some(item.item_number),
                })
                .collect(),
            status: DocumentStatus::Draft,
            total_value: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        order.touch()?;
        let order_number = order.document_number.clone();
        let created = self.store.orders.insert(order)?;

        let marked = self.store.requisitions.update(requisition_number, |req| {
            rules::require_status(
                REQUISITION,
                &req.document_number,
                req.status,
                &[DocumentStatus::Approved],
                "create order from",
            )?;
            for item in req.items.iter_mut() {
                item.status = DocumentItemStatus::Ordered;
                item.assigned_to_order = Some(order_number.clone());
            }
            req.status = DocumentStatus::Ordered;
            req.touch()?;
            Ok(())
        });

        if let Err(e) = marked {
            error!(
                requisition_number,
                order_number = %order_number,
                error = %e,
                "Failed to mark requisition as ordered, rolling back order"
            );
            if let Err(rollback) = self.store.orders.remove_if(&order_number, |_| Ok(())) {
                error!(order_number = %order_number, error = %rollback, "Order rollback failed");
            }
            return Err(e);
        }

        info!(
            document_number = %created.document_number,
            requisition_number,
            "Order created from requisition"
        );
        metrics::record_document_created("order");
        self.publish(Event::OrderCreated {
            document_number: created.document_number.clone(),
            vendor: created.vendor.clone(),
            requisition_reference: created.requisition_reference.clone(),
            total_value: created.total_value,
        })
        .await;
        self.requisition_status_changed(
            requisition_number,
            DocumentStatus::Approved,
            DocumentStatus::Ordered,
        )
        .await;
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update_order(
        &self,
        document_number: &str,
        request: UpdateOrderRequest,
    ) -> ServiceResult<Order> {
        request.validate()?;
        if let Some(items) = &request.items {
            self.check_order_items(items)?;
        }

        let mut status_change = None;
        let updated = self.store.orders.update(document_number, |order| {
            if request.items.is_some() && order.status != DocumentStatus::Draft {
                return Err(
                    ServiceError::validation("Cannot update items after order is submitted")
                        .with_detail("document_number", order.document_number.as_str())
                        .with_detail("current_status", order.status.to_string()),
                );
            }
            if let Some(description) = request.description {
                order.description = description;
            }
            if let Some(requester) = request.requester {
                order.requester = requester;
            }
            if let Some(vendor) = request.vendor {
                order.vendor = vendor.trim().to_string();
            }
            if let Some(payment_terms) = request.payment_terms {
                order.payment_terms = Some(payment_terms);
            }
            if let Some(procurement_type) = request.procurement_type {
                order.procurement_type = procurement_type;
            }
            if let Some(notes) = request.notes {
                order.notes = Some(notes);
            }
            if let Some(items) = request.items {
                order.items = items.into_iter().map(OrderItemInput::into_item).collect();
            }
            if let Some(status) = request.status.filter(|s| *s != order.status) {
                rules::ensure_update_status(ORDER, &order.document_number, order.status, status)?;
                rules::ensure_transition(
                    ORDER,
                    &order.document_number,
                    order.status,
                    status,
                    rules::is_valid_order_transition,
                )?;
                if status == DocumentStatus::Submitted {
                    rules::validate_vendor(&order.vendor)?;
                    rules::validate_order_items(&order.items)?;
                }
                status_change = Some((order.status, status));
                order.status = status;
            }
            order.touch()?;
            Ok(())
        })?;

        if let Some((old, new)) = status_change {
            self.order_status_changed(&updated.document_number, old, new)
                .await;
        }
        Ok(updated)
    }

    async fn transition_order<F>(
        &self,
        document_number: &str,
        action: &str,
        allowed: &[DocumentStatus],
        to: DocumentStatus,
        apply: F,
    ) -> ServiceResult<Order>
    where
        F: FnOnce(&mut Order) -> ServiceResult<()>,
    {
        let mut old_status = to;
        let updated = self.store.orders.update(document_number, |order| {
            rules::require_status(ORDER, &order.document_number, order.status, allowed, action)?;
            rules::ensure_transition(
                ORDER,
                &order.document_number,
                order.status,
                to,
                rules::is_valid_order_transition,
            )?;
            apply(order)?;
            old_status = order.status;
            order.status = to;
            order.touch()?;
            Ok(())
        })?;
        self.order_status_changed(&updated.document_number, old_status, to)
            .await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn submit_order(&self, document_number: &str) -> ServiceResult<Order> {
        self.transition_order(
            document_number,
            "submit",
            &[DocumentStatus::Draft],
            DocumentStatus::Submitted,
            |order| {
                rules::validate_vendor(&order.vendor)?;
                rules::validate_order_items(&order.items)
            },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn approve_order(&self, document_number: &str) -> ServiceResult<Order> {
        self.transition_order(
            document_number,
            "approve",
            &[DocumentStatus::Submitted],
            DocumentStatus::Approved,
            |_| Ok(()),
        )
        .await
    }

    /// Posts a goods receipt. `receipt` maps item number to quantity; `None`
    /// receives every remaining quantity.
    #[instrument(skip(self))]
    pub async fn receive_order(
        &self,
        document_number: &str,
        receipt: Option<BTreeMap<u32, Decimal>>,
    ) -> ServiceResult<Order> {
        let mut old_status = DocumentStatus::Approved;
        let mut received_items = Vec::new();
        let updated = self.store.orders.update(document_number, |order| {
            rules::require_status(
                ORDER,
                &order.document_number,
                order.status,
                rules::ORDER_RECEIVABLE,
                "receive",
            )?;
            let items = rules::prepare_received_items(&order.items, receipt.as_ref())?;
            let new_status = rules::determine_order_status_from_items(&items);
            rules::ensure_transition(
                ORDER,
                &order.document_number,
                order.status,
                new_status,
                rules::is_valid_order_transition,
            )?;
            received_items = items
                .iter()
                .zip(order.items.iter())
                .filter(|(after, before)| after.received_quantity > before.received_quantity)
                .map(|(after, _)| after.item_number)
                .collect();
            old_status = order.status;
            order.items = items;
            order.status = new_status;
            order.touch()?;
            Ok(())
        })?;

        info!(
            document_number,
            items = ?received_items,
            status = %updated.status,
            "Goods receipt posted"
        );
        metrics::record_goods_receipt(received_items.len());
        self.publish(Event::OrderReceived {
            document_number: updated.document_number.clone(),
            received_items,
            at: updated.updated_at,
        })
        .await;
        if old_status != updated.status {
            self.order_status_changed(&updated.document_number, old_status, updated.status)
                .await;
        }
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn complete_order(&self, document_number: &str) -> ServiceResult<Order> {
        self.transition_order(
            document_number,
            "complete",
            rules::ORDER_COMPLETABLE,
            DocumentStatus::Completed,
            |_| Ok(()),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn cancel_order(&self, document_number: &str, reason: &str) -> ServiceResult<Order> {
        let reason = rules::require_reason(reason, "cancel an order")?;
        self.transition_order(
            document_number,
            "cancel",
            rules::ORDER_CANCELABLE,
            DocumentStatus::Canceled,
            |order| {
                let note = format!("CANCELED: {}", reason);
                order.notes = Some(rules::append_note(order.notes.as_deref(), &note));
                Ok(())
            },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_order(&self, document_number: &str) -> ServiceResult<()> {
        self.store.orders.remove_if(document_number, |order| {
            rules::require_status(
                ORDER,
                &order.document_number,
                order.status,
                rules::ORDER_DELETABLE,
                "delete",
            )
        })?;
        info!(document_number, "Order deleted");
        metrics::record_document_deleted("order");
        self.publish(Event::OrderDeleted {
            document_number: document_number.to_string(),
        })
        .await;
        Ok(())
    }
}
