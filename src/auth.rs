//! Opaque bearer tokens issued at registration.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{Role, User};
use crate::state::AppState;

/// The authenticated user behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "This action requires the {} role",
                role_name(role)
            )))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        self.require(Role::Admin)
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::LoadProvider => "load provider",
        Role::VehicleOwner => "vehicle owner",
        Role::Admin => "admin",
    }
}

#[derive(Default)]
pub struct IdentityService {
    tokens: DashMap<String, Caller>,
}

impl IdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, user: &User) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.bind(token.clone(), user);
        token
    }

    pub fn bind(&self, token: String, user: &User) {
        self.tokens.insert(
            token,
            Caller {
                user_id: user.id,
                role: user.role,
            },
        );
    }

    pub fn resolve(&self, token: &str) -> Option<Caller> {
        self.tokens.get(token).map(|entry| *entry.value())
    }
}

/// Registers a provider or owner account and returns it with a fresh token.
pub fn register_user(
    state: &AppState,
    name: &str,
    role: Role,
    phone: Option<String>,
) -> Result<(User, String), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidInput("name cannot be empty".to_string()));
    }
    if role == Role::Admin {
        return Err(AppError::Forbidden(
            "Admin accounts cannot be self-registered".to_string(),
        ));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        phone,
        role,
        created_at: state.now(),
    };

    let txn = state.store.write();
    state.store.insert_user(&txn, user.clone());
    drop(txn);

    let token = state.identity.issue(&user);
    info!(user_id = %user.id, role = role_name(role), "user registered");
    Ok((user, token))
}

/// Creates the admin account that `token` authenticates as.
pub fn seed_admin(state: &AppState, name: &str, token: &str) -> User {
    let user = User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        phone: None,
        role: Role::Admin,
        created_at: state.now(),
    };

    let txn = state.store.write();
    state.store.insert_user(&txn, user.clone());
    drop(txn);

    state.identity.bind(token.to_string(), &user);
    info!(user_id = %user.id, "admin identity seeded");
    user
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Malformed authorization header".to_string()))?;

        state
            .identity
            .resolve(token)
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))
    }
}
