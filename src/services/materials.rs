use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::{
    errors::{ServiceError, ServiceResult},
    events::{Event, EventSender},
    metrics,
    models::{
        CreateMaterialRequest, Material, MaterialFilter, MaterialStatus, UpdateMaterialRequest,
    },
    services::p2p_rules::is_valid_material_transition,
    store::StateManager,
};

/// Service for the material master.
#[derive(Clone)]
pub struct MaterialService {
    store: Arc<StateManager>,
    events: Option<Arc<EventSender>>,
}

impl MaterialService {
    pub fn new(store: Arc<StateManager>, events: Option<Arc<EventSender>>) -> Self {
        Self { store, events }
    }

    async fn publish(&self, event: Event) {
        if let Some(events) = &self.events {
            events.publish(event).await;
        }
    }

    #[instrument(skip(self))]
    pub async fn get_material(&self, material_number: &str) -> ServiceResult<Material> {
        self.store.materials.get(material_number)
    }

    #[instrument(skip(self))]
    pub async fn list_materials(&self, filter: &MaterialFilter) -> Vec<Material> {
        self.store
            .materials
            .list()
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect()
    }

    pub async fn count_materials(&self, filter: &MaterialFilter) -> usize {
        self.list_materials(filter).await.len()
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_material(&self, request: CreateMaterialRequest) -> ServiceResult<Material> {
        request.validate()?;

        let material_number = match request.material_number {
            Some(number) => number.trim().to_string(),
            None => self
                .store
                .next_material_number(request.material_type.number_prefix()),
        };

        let now = Utc::now();
        let material = Material {
            material_number,
            name: request.name,
            description: request.description,
            material_type: request.material_type,
            base_unit: request.base_unit,
            status: request.status,
            weight: request.weight,
            dimensions: request.dimensions,
            created_at: now,
            updated_at: now,
        };

        let created = self.store.materials.insert(material)?;
        info!(material_number = %created.material_number, "Material created");
        metrics::record_document_created("material");
        self.publish(Event::MaterialCreated {
            material_number: created.material_number.clone(),
        })
        .await;
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update_material(
        &self,
        material_number: &str,
        request: UpdateMaterialRequest,
    ) -> ServiceResult<Material> {
        request.validate()?;

        let mut old_status = None;
        let updated = self.store.materials.update(material_number, |material| {
            if let Some(status) = request.status {
                if !is_valid_material_transition(material.status, status) {
                    return Err(ServiceError::validation(format!(
                        "Invalid status transition from {} to {}",
                        material.status, status
                    ))
                    .with_detail("material_number", material.material_number.as_str())
                    .with_detail("current_status", material.status.to_string())
                    .with_detail("requested_status", status.to_string())
                    .with_detail("reason", "invalid_status_transition"));
                }
                if status != material.status {
                    old_status = Some(material.status);
                }
                material.status = status;
            }
            if let Some(name) = request.name {
                material.name = name;
            }
            if let Some(description) = request.description {
                material.description = Some(description);
            }
            if let Some(material_type) = request.material_type {
                material.material_type = material_type;
            }
            if let Some(base_unit) = request.base_unit {
                material.base_unit = base_unit;
            }
            if let Some(weight) = request.weight {
                material.weight = Some(weight);
            }
            if let Some(dimensions) = request.dimensions {
                material.dimensions = dimensions;
            }
            material.updated_at = Utc::now();
            Ok(())
        })?;

        if let Some(old_status) = old_status {
            info!(
                material_number,
                %old_status,
                new_status = %updated.status,
                "Material status changed"
            );
            metrics::record_status_transition("material", updated.status);
            self.publish(Event::MaterialStatusChanged {
                material_number: updated.material_number.clone(),
                old_status,
                new_status: updated.status,
            })
            .await;
        }
        Ok(updated)
    }

    /// Deletes a material. Active materials must be deactivated or deprecated first.
    #[instrument(skip(self))]
    pub async fn delete_material(&self, material_number: &str) -> ServiceResult<()> {
        self.store.materials.remove_if(material_number, |material| {
            if material.status == MaterialStatus::Active {
                warn!(material_number, "Refusing to delete active material");
                return Err(ServiceError::validation(format!(
                    "Cannot delete material with status {}. Deprecate it first.",
                    material.status
                ))
                .with_detail("material_number", material.material_number.as_str())
                .with_detail("current_status", material.status.to_string()));
            }
            Ok(())
        })?;

        info!(material_number, "Material deleted");
        metrics::record_document_deleted("material");
        self.publish(Event::MaterialDeleted {
            material_number: material_number.to_string(),
        })
        .await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn deprecate_material(&self, material_number: &str) -> ServiceResult<Material> {
        let material = self.store.materials.get(material_number)?;
        if material.status == MaterialStatus::Deprecated {
            return Err(ServiceError::validation(format!(
                "Material {} is already deprecated",
                material_number
            ))
            .with_detail("material_number", material_number)
            .with_detail("current_status", material.status.to_string()));
        }
        self.update_material(
            material_number,
            UpdateMaterialRequest {
                status: Some(MaterialStatus::Deprecated),
                ..Default::default()
            },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn activate_material(&self, material_number: &str) -> ServiceResult<Material> {
        let material = self.store.materials.get(material_number)?;
        if material.status == MaterialStatus::Deprecated {
            return Err(ServiceError::validation(format!(
                "Cannot activate deprecated material {}",
                material_number
            ))
            .with_detail("material_number", material_number)
            .with_detail("current_status", material.status.to_string())
            .with_detail("requested_status", MaterialStatus::Active.to_string()));
        }
        self.update_material(
            material_number,
            UpdateMaterialRequest {
                status: Some(MaterialStatus::Active),
                ..Default::default()
            },
        )
        .await
    }

    /// Checks that a material referenced by a line item exists and is active.
    pub fn ensure_active(&self, material_number: &str) -> ServiceResult<Material> {
        let material = self.store.materials.get(material_number).map_err(|_| {
            ServiceError::validation(format!("Material {} not found", material_number))
                .with_detail("material_number", material_number)
                .with_detail("reason", "material_not_found")
        })?;
        if !material.is_active() {
            return Err(ServiceError::validation(format!(
                "Material {} is not active",
                material_number
            ))
            .with_detail("material_number", material_number)
            .with_detail("current_status", material.status.to_string())
            .with_detail("reason", "material_not_active"));
        }
        Ok(material)
    }

    /// Runs [`Self::ensure_active`] for every referenced material.
    pub fn ensure_all_active<'a>(
        &self,
        material_numbers: impl IntoIterator<Item = &'a str>,
    ) -> ServiceResult<()> {
        for number in material_numbers {
            self.ensure_active(number)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MaterialType;
    use assert_matches::assert_matches;

    fn service() -> MaterialService {
        MaterialService::new(Arc::new(StateManager::new()), None)
    }

    fn request(name: &str, material_type: MaterialType) -> CreateMaterialRequest {
        CreateMaterialRequest {
            name: name.to_string(),
            material_type,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_generates_number_from_type() {
        let service = service();
        let raw = service
            .create_material(request("Steel sheet", MaterialType::Raw))
            .await
            .unwrap();
        let fin = service
            .create_material(request("Cabinet", MaterialType::Finished))
            .await
            .unwrap();
        assert_eq!(raw.material_number, "RAW00001");
        assert_eq!(fin.material_number, "FIN00001");
        assert_eq!(raw.status, MaterialStatus::Active);
    }

    #[tokio::test]
    async fn duplicate_material_number_conflicts() {
        let service = service();
        let mut req = request("Bolt", MaterialType::Raw);
        req.material_number = Some("BOLT-1".into());
        service.create_material(req.clone()).await.unwrap();
        assert_matches!(
            service.create_material(req).await,
            Err(ServiceError::Conflict { .. })
        );
    }

    #[tokio::test]
    async fn deprecated_is_terminal() {
        let service = service();
        let m = service
            .create_material(request("Bolt", MaterialType::Raw))
            .await
            .unwrap();
        let number = m.material_number.as_str();

        service.deprecate_material(number).await.unwrap();
        assert_matches!(
            service.deprecate_material(number).await,
            Err(ServiceError::ValidationError { .. })
        );
        assert_matches!(
            service.activate_material(number).await,
            Err(ServiceError::ValidationError { .. })
        );
        let update = UpdateMaterialRequest {
            status: Some(MaterialStatus::Inactive),
            ..Default::default()
        };
        assert_matches!(
            service.update_material(number, update).await,
            Err(ServiceError::ValidationError { .. })
        );
    }

    #[tokio::test]
    async fn active_material_cannot_be_deleted() {
        let service = service();
        let m = service
            .create_material(request("Bolt", MaterialType::Raw))
            .await
            .unwrap();
        let number = m.material_number.as_str();

        assert_matches!(
            service.delete_material(number).await,
            Err(ServiceError::ValidationError { .. })
        );
        service
            .update_material(
                number,
                UpdateMaterialRequest {
                    status: Some(MaterialStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        service.delete_material(number).await.unwrap();
        assert_matches!(
            service.get_material(number).await,
            Err(ServiceError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn ensure_active_reports_missing_and_inactive() {
        let service = service();
        let err = service.ensure_active("NOPE").unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Material NOPE not found");

        let m = service
            .create_material(request("Bolt", MaterialType::Raw))
            .await
            .unwrap();
        service
            .update_material(
                &m.material_number,
                UpdateMaterialRequest {
                    status: Some(MaterialStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = service.ensure_active(&m.material_number).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Validation error: Material {} is not active", m.material_number)
        );
    }

    #[tokio::test]
    async fn list_filters_by_type_and_search() {
        let service = service();
        service
            .create_material(request("Steel sheet", MaterialType::Raw))
            .await
            .unwrap();
        service
            .create_material(request("Consulting hour", MaterialType::Service))
            .await
            .unwrap();

        let filter = MaterialFilter {
            types: vec![MaterialType::Service],
            ..Default::default()
        };
        let services = service.list_materials(&filter).await;
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].material_number, "SRV00001");

        let filter = MaterialFilter {
            search: Some("steel".into()),
            ..Default::default()
        };
        assert_eq!(service.count_materials(&filter).await, 1);
    }
}
