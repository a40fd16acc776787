//! Pure business rules for requisitions, orders and materials.
//!
//! Nothing here touches the store; services load a document, run these
//! checks against it and only then commit.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use crate::errors::{ServiceError, ServiceResult};
use crate::models::{
    DocumentItemStatus, DocumentStatus, MaterialStatus, OrderItem, RequisitionItem,
};

/// Statuses from which an order may be canceled.
pub const ORDER_CANCELABLE: &[DocumentStatus] = &[
    DocumentStatus::Draft,
    DocumentStatus::Submitted,
    DocumentStatus::Approved,
    DocumentStatus::PartiallyReceived,
];

pub const ORDER_DELETABLE: &[DocumentStatus] = &[DocumentStatus::Draft, DocumentStatus::Canceled];

pub const ORDER_RECEIVABLE: &[DocumentStatus] =
    &[DocumentStatus::Approved, DocumentStatus::PartiallyReceived];

pub const ORDER_COMPLETABLE: &[DocumentStatus] =
    &[DocumentStatus::Received, DocumentStatus::PartiallyReceived];

/// Document kind labels used in messages and error details.
pub const REQUISITION_KIND: &str = "Requisition";
pub const ORDER_KIND: &str = "Order";

pub const REQUISITION_DELETABLE: &[DocumentStatus] =
    &[DocumentStatus::Draft, DocumentStatus::Rejected];

pub fn is_valid_requisition_transition(from: DocumentStatus, to: DocumentStatus) -> bool {
    use DocumentStatus::*;
    match (from, to) {
        (Draft, Submitted) => true,
        (Submitted, Approved) | (Submitted, Rejected) => true,
        (Approved, Ordered) => true,
        // Allow transitioning to the same status (no-op)
        _ if from == to => true,
        _ => false,
    }
}

pub fn is_valid_order_transition(from: DocumentStatus, to: DocumentStatus) -> bool {
    use DocumentStatus::*;
    match (from, to) {
        (Draft, Submitted) | (Draft, Canceled) => true,
        (Submitted, Approved) | (Submitted, Canceled) => true,
        (Approved, PartiallyReceived) | (Approved, Received) | (Approved, Canceled) => true,
        (PartiallyReceived, Received)
        | (PartiallyReceived, Completed)
        | (PartiallyReceived, Canceled) => true,
        (Received, Completed) => true,
        _ if from == to => true,
        _ => false,
    }
}

pub fn is_valid_material_transition(from: MaterialStatus, to: MaterialStatus) -> bool {
    use MaterialStatus::*;
    match (from, to) {
        (Active, Inactive) | (Inactive, Active) => true,
        (Active, Deprecated) | (Inactive, Deprecated) => true,
        _ if from == to => true,
        _ => false,
    }
}

fn status_list(statuses: &[DocumentStatus]) -> Value {
    Value::Array(
        statuses
            .iter()
            .map(|s| Value::String(s.to_string()))
            .collect(),
    )
}

/// Rejects a transition that the table for `kind` does not allow.
pub fn ensure_transition(
    kind: &str,
    document_number: &str,
    from: DocumentStatus,
    to: DocumentStatus,
    allowed: fn(DocumentStatus, DocumentStatus) -> bool,
) -> ServiceResult<()> {
    if allowed(from, to) {
        return Ok(());
    }
    Err(ServiceError::validation(format!(
        "Invalid status transition from {} to {}",
        from, to
    ))
    .with_detail("document_type", kind)
    .with_detail("document_number", document_number)
    .with_detail("current_status", from.to_string())
    .with_detail("requested_status", to.to_string())
    .with_detail("reason", "invalid_status_transition"))
}

/// Endpoint that owns the transition into `status`. `None` leaves the
/// decision to the transition table.
fn dedicated_endpoint(kind: &str, status: DocumentStatus) -> Option<&'static str> {
    use DocumentStatus::*;
    let is_order = kind == ORDER_KIND;
    match status {
        Draft | Submitted => None,
        Approved => Some("approve"),
        Rejected if !is_order => Some("reject"),
        Ordered if !is_order => Some("order"),
        PartiallyReceived | Received if is_order => Some("receive"),
        Completed if is_order => Some("complete"),
        Canceled if is_order => Some("cancel"),
        _ => None,
    }
}

/// A plain update may only submit a document. Every other status change
/// carries its own checks and goes through its own endpoint.
pub fn ensure_update_status(
    kind: &str,
    document_number: &str,
    current: DocumentStatus,
    requested: DocumentStatus,
) -> ServiceResult<()> {
    let Some(endpoint) = dedicated_endpoint(kind, requested) else {
        return Ok(());
    };
    Err(ServiceError::validation(format!(
        "Status {} cannot be set by updating {} {}. Use the {} endpoint.",
        requested,
        kind.to_lowercase(),
        document_number,
        endpoint
    ))
    .with_detail("document_type", kind)
    .with_detail("document_number", document_number)
    .with_detail("current_status", current.to_string())
    .with_detail("requested_status", requested.to_string())
    .with_detail("endpoint", endpoint)
    .with_detail("reason", "status_requires_endpoint"))
}

/// Requires the document to be in one of `allowed` before running `action`.
pub fn require_status(
    kind: &str,
    document_number: &str,
    current: DocumentStatus,
    allowed: &[DocumentStatus],
    action: &str,
) -> ServiceResult<()> {
    if allowed.contains(&current) {
        return Ok(());
    }
    let expected = allowed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" or ");
    Err(ServiceError::validation(format!(
        "Cannot {} {} {} with status {}. Must be {}.",
        action,
        kind.to_lowercase(),
        document_number,
        current,
        expected
    ))
    .with_detail("document_type", kind)
    .with_detail("document_number", document_number)
    .with_detail("current_status", current.to_string())
    .with_detail("allowed_statuses", status_list(allowed))
    .with_detail("action", action))
}

pub fn require_reason(reason: &str, action: &str) -> ServiceResult<String> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("A reason is required to {}", action))
            .with_detail("field", "reason"));
    }
    Ok(trimmed.to_string())
}

pub fn validate_vendor(vendor: &str) -> ServiceResult<()> {
    if vendor.trim().is_empty() {
        return Err(ServiceError::validation("Vendor is required").with_detail("field", "vendor"));
    }
    Ok(())
}

pub fn validate_unique_item_numbers(item_numbers: impl IntoIterator<Item = u32>) -> ServiceResult<()> {
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for number in item_numbers {
        if !seen.insert(number) {
            duplicates.insert(number);
        }
    }
    if duplicates.is_empty() {
        return Ok(());
    }
    Err(ServiceError::validation("Item numbers must be unique")
        .with_detail("duplicate_items", json!(duplicates)))
}

fn validate_line_items<'a>(
    lines: impl Iterator<Item = (u32, &'a Decimal, &'a Decimal)>,
) -> ServiceResult<()> {
    let mut numbers = Vec::new();
    let mut invalid_quantities = Map::new();
    let mut negative_prices = Map::new();
    for (number, quantity, price) in lines {
        numbers.push(number);
        if *quantity <= Decimal::ZERO {
            invalid_quantities.insert(number.to_string(), json!(quantity));
        }
        if *price < Decimal::ZERO {
            negative_prices.insert(number.to_string(), json!(price));
        }
    }
    if numbers.is_empty() {
        return Err(
            ServiceError::validation("At least one item is required").with_detail("field", "items")
        );
    }
    if !invalid_quantities.is_empty() {
        return Err(ServiceError::validation("Item quantities must be positive")
            .with_detail("invalid_quantities", Value::Object(invalid_quantities)));
    }
    if !negative_prices.is_empty() {
        return Err(ServiceError::validation("Item prices must not be negative")
            .with_detail("negative_prices", Value::Object(negative_prices)));
    }
    validate_unique_item_numbers(numbers)
}

/// Items must be non-empty, have positive quantities and unique numbers.
pub fn validate_requisition_items(items: &[RequisitionItem]) -> ServiceResult<()> {
    validate_line_items(
        items
            .iter()
            .map(|item| (item.item_number, &item.quantity, &item.price)),
    )
}

pub fn validate_order_items(items: &[OrderItem]) -> ServiceResult<()> {
    validate_line_items(
        items
            .iter()
            .map(|item| (item.item_number, &item.quantity, &item.price)),
    )
}

fn item_status_for(item: &OrderItem) -> DocumentItemStatus {
    if item.is_fully_received() {
        DocumentItemStatus::Received
    } else if item.received_quantity > Decimal::ZERO {
        DocumentItemStatus::PartiallyReceived
    } else {
        item.status
    }
}

/// Validates a goods receipt and returns the items with quantities applied.
///
/// `receipt` maps item number to the quantity received now. `None` receives
/// every remaining quantity. Checks run in order: unknown items, negative
/// quantities, over-receipt.
pub fn prepare_received_items(
    items: &[OrderItem],
    receipt: Option<&BTreeMap<u32, Decimal>>,
) -> ServiceResult<Vec<OrderItem>> {
    let receipt: BTreeMap<u32, Decimal> = match receipt {
        Some(receipt) => receipt.clone(),
        None => items
            .iter()
            .map(|item| (item.item_number, item.remaining_quantity()))
            .collect(),
    };

    let unknown: Vec<u32> = receipt
        .keys()
        .copied()
        .filter(|number| !items.iter().any(|item| item.item_number == *number))
        .collect();
    if !unknown.is_empty() {
        return Err(ServiceError::validation("Receipt references unknown items")
            .with_detail("unknown_items", json!(unknown)));
    }

    let negative: Map<String, Value> = receipt
        .iter()
        .filter(|(_, quantity)| quantity.is_sign_negative() && !quantity.is_zero())
        .map(|(number, quantity)| (number.to_string(), json!(quantity)))
        .collect();
    if !negative.is_empty() {
        return Err(ServiceError::validation("Received quantities must not be negative")
            .with_detail("negative_quantities", Value::Object(negative)));
    }

    let over_receipt: Vec<Value> = items
        .iter()
        .filter_map(|item| {
            let attempted = *receipt.get(&item.item_number)?;
            let fits = item
                .received_quantity
                .checked_add(attempted)
                .is_some_and(|total| total <= item.quantity);
            if !fits {
                Some(json!({
                    "item_number": item.item_number,
                    "ordered": item.quantity,
                    "already_received": item.received_quantity,
                    "attempted": attempted,
                    "remaining": item.remaining_quantity(),
                }))
            } else {
                None
            }
        })
        .collect();
    if !over_receipt.is_empty() {
        return Err(
            ServiceError::validation("Received quantity exceeds ordered quantity")
                .with_detail("over_receipt", Value::Array(over_receipt)),
        );
    }

    Ok(items
        .iter()
        .map(|item| {
            let mut updated = item.clone();
            if let Some(quantity) = receipt.get(&item.item_number) {
                updated.received_quantity += *quantity;
                updated.status = item_status_for(&updated);
            }
            updated
        })
        .collect())
}

/// Derives the order status from aggregate receipt state.
pub fn determine_order_status_from_items(items: &[OrderItem]) -> DocumentStatus {
    let any_received = items
        .iter()
        .any(|item| item.received_quantity > Decimal::ZERO);
    let all_received = !items.is_empty() && items.iter().all(OrderItem::is_fully_received);

    if all_received {
        DocumentStatus::Received
    } else if any_received {
        DocumentStatus::PartiallyReceived
    } else {
        DocumentStatus::Approved
    }
}

pub fn append_note(existing: Option<&str>, note: &str) -> String {
    match existing.map(str::trim).filter(|s| !s.is_empty()) {
        Some(existing) => format!("{}\n{}", existing, note),
        None => note.to_string(),
    }
}
