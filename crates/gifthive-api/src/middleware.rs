use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use gifthive_types::AUTH_HEADER;

use crate::error::ApiError;
use crate::{AppState, blocking};

/// The caller resolved from the access token, available to handlers as
/// `Extension<AuthUser>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
}

/// Look up the user owning the token in the `auth` header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Access token is missing".into()))?
        .to_string();

    let user = blocking(&state, move |db| Ok(db.get_user_by_token(&token)?))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid access token".into()))?;

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        username: user.username,
    });
    Ok(next.run(req).await)
}
