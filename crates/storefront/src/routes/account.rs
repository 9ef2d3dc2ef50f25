//! Account route handlers: profile, sign-out and address book.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use milletmart_core::{AddressId, AddressInput, ShippingAddress};

use crate::db::addresses::AddressRepository;
use crate::db::users::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireUser, bearer_token};
use crate::models::{SavedAddress, User};
use crate::services::cart::CartService;
use crate::state::AppState;

/// Body of `POST /api/account/addresses`.
#[derive(Debug, Deserialize)]
pub struct CreateAddress {
    #[serde(flatten)]
    pub address: AddressInput,
    #[serde(default)]
    pub make_default: bool,
}

/// The signed-in user's profile.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn me(State(state): State<AppState>, RequireUser(user): RequireUser) -> Result<Json<User>> {
    UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User".to_string()))
}

/// Sign out on this server.
///
/// The token is dropped from the identity cache so it has to be checked
/// with the provider again, and the next sign-in in this browser merges
/// its guest cart afresh.
#[instrument(skip(state, headers, session, user), fields(user_id = %user.id))]
pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
    session: Session,
    RequireUser(user): RequireUser,
) -> Result<StatusCode> {
    if let Some(token) = bearer_token(&headers) {
        state.identity().forget(token).await;
    }
    CartService::new(state.pool(), &session, state.shipping())
        .end_login()
        .await?;
    info!("Signed out");
    Ok(StatusCode::NO_CONTENT)
}

/// Saved addresses, default first.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn addresses(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<SavedAddress>>> {
    Ok(Json(AddressRepository::new(state.pool()).list(user.id).await?))
}

/// Save a new address.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<CreateAddress>,
) -> Result<(StatusCode, Json<SavedAddress>)> {
    let address = ShippingAddress::try_from(body.address)?;
    let saved = AddressRepository::new(state.pool())
        .create(user.id, &address, body.make_default)
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// Make an address the default.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn set_default_address(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
) -> Result<Json<SavedAddress>> {
    Ok(Json(
        AddressRepository::new(state.pool())
            .set_default(user.id, id)
            .await?,
    ))
}

/// Delete an address.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_address(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressRepository::new(state.pool())
        .delete(user.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
