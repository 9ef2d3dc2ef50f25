//! Admin combo management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use milletmart_core::ComboId;

use crate::db::combos::{ComboChanges, ComboRepository, NewCombo};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::Combo;
use crate::state::AppState;

/// All combos, including inactive ones.
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Combo>>> {
    Ok(Json(ComboRepository::new(state.pool()).list(true).await?))
}

#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ComboId>,
) -> Result<Json<Combo>> {
    Ok(Json(ComboRepository::new(state.pool()).get_by_id(id).await?))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, slug = %body.slug))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewCombo>,
) -> Result<(StatusCode, Json<Combo>)> {
    let combo = ComboRepository::new(state.pool()).create(&body).await?;
    info!(combo_id = %combo.id, "Combo created");
    Ok((StatusCode::CREATED, Json(combo)))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ComboId>,
    Json(body): Json<ComboChanges>,
) -> Result<Json<Combo>> {
    Ok(Json(
        ComboRepository::new(state.pool()).update(id, &body).await?,
    ))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn deactivate(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ComboId>,
) -> Result<Json<Combo>> {
    let changes = ComboChanges {
        is_active: Some(false),
        ..ComboChanges::default()
    };
    let combo = ComboRepository::new(state.pool())
        .update(id, &changes)
        .await?;
    info!(combo_id = %id, "Combo deactivated");
    Ok(Json(combo))
}
