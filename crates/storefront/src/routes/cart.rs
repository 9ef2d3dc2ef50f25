//! Cart route handlers.
//!
//! Guests and signed-in users share these endpoints; the bearer token, when
//! present, selects the user's stored cart instead of the session cart.
//! Every response is the freshly reconciled and priced cart.

use axum::{Json, extract::State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use milletmart_core::cart::{CartLine, CartSummary, LineKey};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::{OptionalUser, RequireUser};
use crate::models::CurrentUser;
use crate::services::cart::{CartOwner, CartService};
use crate::state::AppState;

const fn default_quantity() -> u32 {
    1
}

/// Body of `POST /api/cart/items`.
#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub item: LineKey,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

/// Body of `PATCH /api/cart/items`.
#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    pub item: LineKey,
    pub quantity: u32,
}

/// Body of `DELETE /api/cart/items`.
#[derive(Debug, Deserialize)]
pub struct RemoveItem {
    pub item: LineKey,
}

/// Body of `POST /api/cart/merge`: lines the browser kept in local storage.
#[derive(Debug, Default, Deserialize)]
pub struct MergeCart {
    #[serde(default)]
    pub items: Vec<CartLine>,
}

fn owner(user: Option<&CurrentUser>) -> CartOwner {
    user.map_or(CartOwner::Guest, |u| CartOwner::User(u.id))
}

/// Show the cart.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Result<Json<CartSummary>> {
    let service = CartService::new(state.pool(), &session, state.shipping());
    Ok(Json(service.view(owner(user.as_ref())).await?))
}

/// Add an item.
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Json(body): Json<AddItem>,
) -> Result<Json<CartSummary>> {
    let service = CartService::new(state.pool(), &session, state.shipping());
    let summary = service
        .add(owner(user.as_ref()), body.item, body.quantity)
        .await?;
    let item = body.item.to_string();
    add_breadcrumb("cart", "Added item", Some(&[("item", item.as_str())]));
    Ok(Json(summary))
}

/// Change a line's quantity; zero removes it.
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Json(body): Json<SetQuantity>,
) -> Result<Json<CartSummary>> {
    let service = CartService::new(state.pool(), &session, state.shipping());
    Ok(Json(
        service
            .set_quantity(owner(user.as_ref()), body.item, body.quantity)
            .await?,
    ))
}

/// Remove a line.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Json(body): Json<RemoveItem>,
) -> Result<Json<CartSummary>> {
    let service = CartService::new(state.pool(), &session, state.shipping());
    Ok(Json(service.remove(owner(user.as_ref()), body.item).await?))
}

/// Empty the cart.
#[instrument(skip(state, session, user))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Result<Json<CartSummary>> {
    let service = CartService::new(state.pool(), &session, state.shipping());
    Ok(Json(service.clear(owner(user.as_ref())).await?))
}

/// Fold the guest cart into the signed-in user's cart.
///
/// The client calls this right after sign-in. Repeated calls in the same
/// login return the user's cart without merging again.
#[instrument(skip(state, session, user, body))]
pub async fn merge(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    body: Option<Json<MergeCart>>,
) -> Result<Json<CartSummary>> {
    let local = body.map(|Json(b)| b.items).unwrap_or_default();
    let service = CartService::new(state.pool(), &session, state.shipping());
    Ok(Json(service.merge_on_login(user.id, local).await?))
}
