//! Domain models for the procure-to-pay service.
//!
//! Status and classification enums are shared between materials,
//! requisitions and orders. They serialize in SCREAMING_SNAKE_CASE and parse
//! case-insensitively so query strings like `?status=draft` work.

pub mod material;
pub mod p2p;

pub use material::*;
pub use p2p::*;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use utoipa::ToSchema;
use validator::ValidationError;

/// Lifecycle status shared by requisitions and orders.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum DocumentStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Ordered,
    PartiallyReceived,
    Received,
    Completed,
    #[serde(alias = "CANCELLED")]
    #[strum(to_string = "CANCELED", serialize = "CANCELLED")]
    Canceled,
}

impl Default for DocumentStatus {
    fn default() -> Self {
        Self::Draft
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum DocumentItemStatus {
    Open,
    Ordered,
    PartiallyReceived,
    Received,
}

impl Default for DocumentItemStatus {
    fn default() -> Self {
        Self::Open
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ProcurementType {
    Standard,
    Subcontracting,
    Consignment,
    Service,
}

impl Default for ProcurementType {
    fn default() -> Self {
        Self::Standard
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum MaterialType {
    Raw,
    Semifinished,
    Finished,
    Service,
    Trading,
}

impl MaterialType {
    /// Prefix used when generating material numbers.
    pub fn number_prefix(self) -> &'static str {
        match self {
            Self::Raw => "RAW",
            Self::Semifinished => "SEMI",
            Self::Finished => "FIN",
            Self::Service => "SRV",
            Self::Trading => "TRD",
        }
    }
}

impl Default for MaterialType {
    fn default() -> Self {
        Self::Finished
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum UnitOfMeasure {
    Ea,
    Kg,
    G,
    L,
    M,
    M2,
    M3,
    H,
    Box,
    Pal,
}

impl Default for UnitOfMeasure {
    fn default() -> Self {
        Self::Ea
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum MaterialStatus {
    Active,
    Inactive,
    Deprecated,
}

impl Default for MaterialStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// Parses a comma separated list of enum values, e.g. `DRAFT,submitted`.
pub fn parse_status_list<T>(raw: &str) -> Result<Vec<T>, String>
where
    T: std::str::FromStr,
{
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<T>()
                .map_err(|_| format!("Invalid value '{}'", part))
        })
        .collect()
}

pub(crate) fn validate_positive_quantity(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("quantity_must_be_positive"));
    }
    Ok(())
}

pub(crate) fn validate_non_negative_price(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("price_must_not_be_negative"));
    }
    Ok(())
}

/// Keys are trimmed before storage, so whitespace-only values are refused.
pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("must_not_be_blank"));
    }
    Ok(())
}

pub(crate) fn validate_item_number(value: u32) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::new("item_number_must_be_positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case("DRAFT", DocumentStatus::Draft)]
    #[case("partially_received", DocumentStatus::PartiallyReceived)]
    #[case("CANCELED", DocumentStatus::Canceled)]
    #[case("cancelled", DocumentStatus::Canceled)]
    fn document_status_parses_case_insensitively(
        #[case] raw: &str,
        #[case] expected: DocumentStatus,
    ) {
        assert_eq!(DocumentStatus::from_str(raw).unwrap(), expected);
    }

    #[test]
    fn document_status_serializes_screaming_snake_case() {
        assert_eq!(DocumentStatus::PartiallyReceived.to_string(), "PARTIALLY_RECEIVED");
        assert_eq!(DocumentStatus::Canceled.to_string(), "CANCELED");
        assert_eq!(
            serde_json::to_string(&DocumentStatus::PartiallyReceived).unwrap(),
            "\"PARTIALLY_RECEIVED\""
        );
        let parsed: DocumentStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(parsed, DocumentStatus::Canceled);
    }

    #[test]
    fn parse_status_list_rejects_unknown_values() {
        let parsed: Vec<DocumentStatus> = parse_status_list("draft, SUBMITTED").unwrap();
        assert_eq!(parsed, vec![DocumentStatus::Draft, DocumentStatus::Submitted]);
        assert!(parse_status_list::<DocumentStatus>("draft,bogus").is_err());
    }

    #[test]
    fn material_type_prefixes() {
        assert_eq!(MaterialType::Raw.number_prefix(), "RAW");
        assert_eq!(MaterialType::default().number_prefix(), "FIN");
        assert_eq!(UnitOfMeasure::M2.to_string(), "M2");
    }
}
