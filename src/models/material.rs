use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{validate_not_blank, MaterialStatus, MaterialType, UnitOfMeasure};

/// Material master record referenced by requisition and order items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Material {
    /// Unique material number, e.g. `RAW00042`.
    pub material_number: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub material_type: MaterialType,
    pub base_unit: UnitOfMeasure,
    pub status: MaterialStatus,
    pub weight: Option<Decimal>,
    /// Free-form dimensions keyed by axis (`length`, `width`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: BTreeMap<String, Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    pub fn is_active(&self) -> bool {
        self.status == MaterialStatus::Active
    }
}

fn validate_weight(weight: &Decimal) -> Result<(), ValidationError> {
    if weight.is_sign_negative() && !weight.is_zero() {
        return Err(ValidationError::new("weight_must_not_be_negative"));
    }
    Ok(())
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateMaterialRequest {
    /// Generated from the material type when omitted.
    #[validate(length(min = 1, max = 40), custom = "validate_not_blank")]
    pub material_number: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub material_type: MaterialType,
    #[serde(default)]
    pub base_unit: UnitOfMeasure,
    #[serde(default)]
    pub status: MaterialStatus,
    #[validate(custom = "validate_weight")]
    pub weight: Option<Decimal>,
    #[serde(default)]
    pub dimensions: BTreeMap<String, Decimal>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateMaterialRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub material_type: Option<MaterialType>,
    pub base_unit: Option<UnitOfMeasure>,
    pub status: Option<MaterialStatus>,
    #[validate(custom = "validate_weight")]
    pub weight: Option<Decimal>,
    pub dimensions: Option<BTreeMap<String, Decimal>>,
}

#[derive(Clone, Debug, Default)]
pub struct MaterialFilter {
    pub statuses: Vec<MaterialStatus>,
    pub types: Vec<MaterialType>,
    pub search: Option<String>,
}

impl MaterialFilter {
    pub fn matches(&self, material: &Material) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&material.status) {
            return false;
        }
        if !self.types.is_empty() && !self.types.contains(&material.material_type) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                material.material_number.to_lowercase().contains(&term)
                    || material.name.to_lowercase().contains(&term)
                    || material
                        .description
                        .as_deref()
                        .map(|d| d.to_lowercase().contains(&term))
                        .unwrap_or(false)
            }
            _ => true,
        }
    }
}
