use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::{ServiceError, ServiceResult};

use super::{
    validate_item_number, validate_not_blank, validate_non_negative_price, validate_positive_quantity,
    DocumentItemStatus, DocumentStatus, ProcurementType, UnitOfMeasure,
};

/// Line item of a purchase requisition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RequisitionItem {
    pub item_number: u32,
    pub material_number: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
    pub price: Decimal,
    pub status: DocumentItemStatus,
    /// Order number this item was converted into.
    pub assigned_to_order: Option<String>,
}

impl RequisitionItem {
    /// `quantity * price`, or `None` when it exceeds the decimal range.
    pub fn value(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.price)
    }
}

/// Sums line values, refusing amounts that do not fit in a `Decimal`.
fn checked_total(
    document_number: &str,
    values: impl Iterator<Item = (u32, Option<Decimal>)>,
) -> ServiceResult<Decimal> {
    let mut total = Decimal::ZERO;
    for (item_number, value) in values {
        total = value
            .and_then(|value| total.checked_add(value))
            .ok_or_else(|| {
                ServiceError::validation(format!(
                    "Value of item {} exceeds the supported amount range",
                    item_number
                ))
                .with_detail("document_number", document_number)
                .with_detail("item_number", item_number)
                .with_detail("reason", "amount_overflow")
            })?;
    }
    Ok(total)
}

/// Internal purchase request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Requisition {
    pub document_number: String,
    pub description: String,
    pub requester: String,
    pub department: Option<String>,
    pub procurement_type: ProcurementType,
    pub notes: Option<String>,
    pub items: Vec<RequisitionItem>,
    pub status: DocumentStatus,
    pub total_value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Requisition {
    /// Recomputes derived fields and bumps `updated_at`.
    pub fn touch(&mut self) -> ServiceResult<()> {
        self.total_value = checked_total(
            &self.document_number,
            self.items.iter().map(|item| (item.item_number, item.value())),
        )?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn item(&self, item_number: u32) -> Option<&RequisitionItem> {
        self.items.iter().find(|item| item.item_number == item_number)
    }
}

/// Line item of a purchase order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub item_number: u32,
    pub material_number: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
    pub price: Decimal,
    pub received_quantity: Decimal,
    pub status: DocumentItemStatus,
    pub requisition_reference: Option<String>,
    pub requisition_item: Option<u32>,
}

impl OrderItem {
    pub fn value(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.price)
    }

    pub fn remaining_quantity(&self) -> Decimal {
        (self.quantity - self.received_quantity).max(Decimal::ZERO)
    }

    pub fn is_fully_received(&self) -> bool {
        self.received_quantity >= self.quantity
    }
}

/// Vendor purchase order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub document_number: String,
    pub description: String,
    pub requester: String,
    pub vendor: String,
    pub payment_terms: Option<String>,
    pub requisition_reference: Option<String>,
    pub procurement_type: ProcurementType,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub status: DocumentStatus,
    pub total_value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Recomputes derived fields and bumps `updated_at`.
    pub fn touch(&mut self) -> ServiceResult<()> {
        self.total_value = checked_total(
            &self.document_number,
            self.items.iter().map(|item| (item.item_number, item.value())),
        )?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn item(&self, item_number: u32) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.item_number == item_number)
    }
}

// Request DTOs

#[derive(Clone, Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RequisitionItemInput {
    #[validate(custom = "validate_item_number")]
    pub item_number: u32,
    pub material_number: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(custom = "validate_positive_quantity")]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: UnitOfMeasure,
    #[serde(default)]
    #[validate(custom = "validate_non_negative_price")]
    pub price: Decimal,
}

impl RequisitionItemInput {
    pub fn into_item(self) -> RequisitionItem {
        RequisitionItem {
            item_number: self.item_number,
            material_number: self.material_number,
            description: self.description,
            quantity: self.quantity,
            unit: self.unit,
            price: self.price,
            status: DocumentItemStatus::Open,
            assigned_to_order: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateRequisitionRequest {
    /// Generated (`PR` + 6 digits) when omitted.
    #[validate(length(min = 1, max = 40), custom = "validate_not_blank")]
    pub document_number: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(length(min = 1, max = 100))]
    pub requester: String,
    pub department: Option<String>,
    #[serde(default)]
    pub procurement_type: ProcurementType,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate]
    pub items: Vec<RequisitionItemInput>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateRequisitionRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub requester: Option<String>,
    pub department: Option<String>,
    pub procurement_type: Option<ProcurementType>,
    pub notes: Option<String>,
    pub items: Option<Vec<RequisitionItemInput>>,
    pub status: Option<DocumentStatus>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemInput {
    #[validate(custom = "validate_item_number")]
    pub item_number: u32,
    pub material_number: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(custom = "validate_positive_quantity")]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: UnitOfMeasure,
    #[serde(default)]
    #[validate(custom = "validate_non_negative_price")]
    pub price: Decimal,
}

impl OrderItemInput {
    pub fn into_item(self) -> OrderItem {
        OrderItem {
            item_number: self.item_number,
            material_number: self.material_number,
            description: self.description,
            quantity: self.quantity,
            unit: self.unit,
            price: self.price,
            received_quantity: Decimal::ZERO,
            status: DocumentItemStatus::Open,
            requisition_reference: None,
            requisition_item: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    /// Generated (`PO` + 6 digits) when omitted.
    #[validate(length(min = 1, max = 40), custom = "validate_not_blank")]
    pub document_number: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(length(min = 1, max = 100))]
    pub requester: String,
    pub vendor: String,
    pub payment_terms: Option<String>,
    pub requisition_reference: Option<String>,
    #[serde(default)]
    pub procurement_type: ProcurementType,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate]
    pub items: Vec<OrderItemInput>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub requester: Option<String>,
    pub vendor: Option<String>,
    pub payment_terms: Option<String>,
    pub procurement_type: Option<ProcurementType>,
    pub notes: Option<String>,
    pub items: Option<Vec<OrderItemInput>>,
    pub status: Option<DocumentStatus>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderFromRequisitionRequest {
    pub vendor: String,
    pub payment_terms: Option<String>,
}

/// Body for reject and cancel transitions.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReceiptLine {
    pub item_number: u32,
    pub quantity: Decimal,
}

/// Goods receipt. Omitting `items` receives every remaining quantity.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ReceiveOrderRequest {
    pub items: Option<Vec<ReceiptLine>>,
}

// Filters

fn within_dates(
    created_at: &DateTime<Utc>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
) -> bool {
    let day = created_at.date_naive();
    date_from.map_or(true, |from| day >= from) && date_to.map_or(true, |to| day <= to)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn search_term(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
}

#[derive(Clone, Debug, Default)]
pub struct RequisitionFilter {
    pub statuses: Vec<DocumentStatus>,
    pub requester: Option<String>,
    pub department: Option<String>,
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl RequisitionFilter {
    pub fn matches(&self, requisition: &Requisition) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&requisition.status) {
            return false;
        }
        if let Some(requester) = &self.requester {
            if !requisition.requester.eq_ignore_ascii_case(requester) {
                return false;
            }
        }
        if let Some(department) = &self.department {
            let matches = requisition
                .department
                .as_deref()
                .map(|d| d.eq_ignore_ascii_case(department))
                .unwrap_or(false);
            if !matches {
                return false;
            }
        }
        if !within_dates(&requisition.created_at, self.date_from, self.date_to) {
            return false;
        }
        match search_term(&self.search) {
            Some(term) => {
                contains_ci(&requisition.description, &term)
                    || contains_ci(&requisition.document_number, &term)
                    || requisition
                        .items
                        .iter()
                        .any(|item| contains_ci(&item.description, &term))
            }
            None => true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub statuses: Vec<DocumentStatus>,
    pub vendor: Option<String>,
    pub requisition_reference: Option<String>,
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&order.status) {
            return false;
        }
        if let Some(vendor) = &self.vendor {
            if !order.vendor.eq_ignore_ascii_case(vendor) {
                return false;
            }
        }
        if let Some(reference) = &self.requisition_reference {
            if order.requisition_reference.as_deref() != Some(reference.as_str()) {
                return false;
            }
        }
        if !within_dates(&order.created_at, self.date_from, self.date_to) {
            return false;
        }
        match search_term(&self.search) {
            Some(term) => {
                contains_ci(&order.description, &term)
                    || contains_ci(&order.document_number, &term)
                    || contains_ci(&order.vendor, &term)
                    || order
                        .items
                        .iter()
                        .any(|item| contains_ci(&item.description, &term))
            }
            None => true,
        }
    }
}
