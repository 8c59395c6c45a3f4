use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use rentra_core::{Requester, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

/// Token claims minted by the identity collaborator. Role literals are
/// `"user"` and `"admin"`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub exp: usize,
}

fn resolve_requester(state: &AppState, req: &Request) -> Result<Requester, StatusCode> {
    // 1. Extract token from Authorization header
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Decode and validate JWT
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // 3. Map the role literal; unknown roles are rejected outright
    let role = Role::parse(&token_data.claims.role).ok_or(StatusCode::FORBIDDEN)?;

    Ok(Requester {
        id: token_data.claims.sub,
        role,
    })
}

/// Any authenticated caller (customer or admin).
pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let requester = resolve_requester(&state, &req)?;
    req.extensions_mut().insert(requester);
    Ok(next.run(req).await)
}

/// Admin-only routes.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let requester = resolve_requester(&state, &req)?;
    if !requester.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }
    req.extensions_mut().insert(requester);
    Ok(next.run(req).await)
}
