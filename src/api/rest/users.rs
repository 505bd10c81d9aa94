use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::rest::{ok, ApiResult};
use crate::auth::register_user;
use crate::models::user::{Role, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(register))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct Registered {
    pub user: User,
    pub token: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Registered> {
    let (user, token) = register_user(&state, &payload.name, payload.role, payload.phone)?;
    Ok(ok(Registered { user, token }))
}
