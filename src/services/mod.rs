pub mod materials;
pub mod monitor;
pub mod p2p;
pub mod p2p_rules;

use rust_decimal::Decimal;
use tracing::info;

use crate::{
    errors::ServiceResult,
    models::{
        CreateMaterialRequest, CreateRequisitionRequest, MaterialType, ProcurementType,
        RequisitionItemInput, UnitOfMeasure,
    },
};

pub use materials::MaterialService;
pub use monitor::MonitorService;
pub use p2p::P2PService;

/// Loads a small material catalogue and one draft requisition for local runs.
pub async fn seed_demo_data(materials: &MaterialService, p2p: &P2PService) -> ServiceResult<()> {
    let catalogue = [
        ("Steel sheet 2mm", MaterialType::Raw, UnitOfMeasure::Kg),
        ("Office chair", MaterialType::Trading, UnitOfMeasure::Ea),
        ("Packaging box", MaterialType::Semifinished, UnitOfMeasure::Box),
        ("Installation service", MaterialType::Service, UnitOfMeasure::H),
    ];

    let mut numbers = Vec::with_capacity(catalogue.len());
    for (name, material_type, base_unit) in catalogue {
        let material = materials
            .create_material(CreateMaterialRequest {
                name: name.to_string(),
                material_type,
                base_unit,
                ..Default::default()
            })
            .await?;
        numbers.push((material.material_number, name, base_unit));
    }

    let items = numbers
        .into_iter()
        .take(2)
        .enumerate()
        .map(|(idx, (number, name, unit))| RequisitionItemInput {
            item_number: (idx as u32 + 1) * 10,
            material_number: Some(number),
            description: name.to_string(),
            quantity: Decimal::from(5),
            unit,
            price: Decimal::new(12_500, 2),
        })
        .collect();

    let requisition = p2p
        .create_requisition(CreateRequisitionRequest {
            document_number: None,
            description: "Demo requisition".to_string(),
            requester: "demo".to_string(),
            department: Some("Operations".to_string()),
            procurement_type: ProcurementType::Standard,
            notes: None,
            items,
        })
        .await?;

    info!(
        requisition = %requisition.document_number,
        "Seeded demo materials and requisition"
    );
    Ok(())
}
