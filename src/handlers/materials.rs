use super::common::{
    created_response, map_service_error, message_response, paginate, parse_enum_filter,
    success_response,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    models::{CreateMaterialRequest, Material, MaterialFilter, UpdateMaterialRequest},
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

/// Router for material master endpoints
pub fn material_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_materials).post(create_material))
        .route(
            "/:number",
            get(get_material).put(update_material).delete(delete_material),
        )
        .route("/:number/deprecate", post(deprecate_material))
        .route("/:number/activate", post(activate_material))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MaterialListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Comma separated statuses, e.g. `ACTIVE,INACTIVE`
    pub status: Option<String>,
    /// Comma separated material types, e.g. `RAW,SERVICE`
    #[serde(rename = "type")]
    pub material_type: Option<String>,
    pub search: Option<String>,
}

/// List materials
#[utoipa::path(
    get,
    path = "/api/v1/materials",
    params(MaterialListQuery),
    responses(
        (status = 200, description = "Materials listed", body = crate::ApiResponse<crate::PaginatedResponse<Material>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn list_materials(
    State(state): State<AppState>,
    Query(query): Query<MaterialListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = MaterialFilter {
        statuses: parse_enum_filter("status", query.status.as_deref())?,
        types: parse_enum_filter("type", query.material_type.as_deref())?,
        search: query.search,
    };
    let materials = state.services.materials.list_materials(&filter).await;
    Ok(success_response(paginate(
        materials,
        query.page,
        query.per_page,
        state.config.api_default_page_size,
        state.config.api_max_page_size,
    )))
}

/// Create a material
#[utoipa::path(
    post,
    path = "/api/v1/materials",
    request_body = CreateMaterialRequest,
    responses(
        (status = 201, description = "Material created", body = crate::ApiResponse<Material>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Material number already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn create_material(
    State(state): State<AppState>,
    Json(payload): Json<CreateMaterialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let material = state
        .services
        .materials
        .create_material(payload)
        .await
        .map_err(map_service_error)?;

    info!("Material created: {}", material.material_number);
    Ok(created_response(material))
}

/// Get a material by number
#[utoipa::path(
    get,
    path = "/api/v1/materials/{number}",
    params(("number" = String, Path, description = "Material number")),
    responses(
        (status = 200, description = "Material fetched", body = crate::ApiResponse<Material>),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn get_material(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let material = state
        .services
        .materials
        .get_material(&number)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(material))
}

/// Update a material
#[utoipa::path(
    put,
    path = "/api/v1/materials/{number}",
    request_body = UpdateMaterialRequest,
    params(("number" = String, Path, description = "Material number")),
    responses(
        (status = 200, description = "Material updated", body = crate::ApiResponse<Material>),
        (status = 400, description = "Invalid request or status transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn update_material(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(payload): Json<UpdateMaterialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let material = state
        .services
        .materials
        .update_material(&number, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(material))
}

/// Delete a material that is not active
#[utoipa::path(
    delete,
    path = "/api/v1/materials/{number}",
    params(("number" = String, Path, description = "Material number")),
    responses(
        (status = 200, description = "Material deleted"),
        (status = 400, description = "Material is still active", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn delete_material(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .materials
        .delete_material(&number)
        .await
        .map_err(map_service_error)?;
    Ok(message_response(format!("Material {} deleted", number)))
}

#[utoipa::path(
    post,
    path = "/api/v1/materials/{number}/deprecate",
    params(("number" = String, Path, description = "Material number")),
    responses(
        (status = 200, description = "Material deprecated", body = crate::ApiResponse<Material>),
        (status = 400, description = "Material already deprecated", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn deprecate_material(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let material = state
        .services
        .materials
        .deprecate_material(&number)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(material))
}

#[utoipa::path(
    post,
    path = "/api/v1/materials/{number}/activate",
    params(("number" = String, Path, description = "Material number")),
    responses(
        (status = 200, description = "Material activated", body = crate::ApiResponse<Material>),
        (status = 400, description = "Material is deprecated", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn activate_material(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let material = state
        .services
        .materials
        .activate_material(&number)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(material))
}
