use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::RngCore;
use tracing::info;
use uuid::Uuid;

use gifthive_db::models::UserWrite;
use gifthive_types::api::{
    DashboardResponse, Envelope, LoginRequest, LoginResponse, MessageBody, RegisterRequest,
    RegisterResponse, UpdateUserRequest, UserSummary,
};

use crate::error::ApiError;
use crate::extract::{ApiJson, missing, non_blank, required};
use crate::middleware::AuthUser;
use crate::{AppState, blocking};

pub const PASSWORD_POLICY: &str = "Password must be at least 7 characters long and include \
     an uppercase letter, a lowercase letter and a number.";

const MIN_PASSWORD_LEN: usize = 7;

/// Random bytes behind each access token (hex encoded on the wire).
const TOKEN_BYTES: usize = 64;

pub fn password_meets_policy(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = required(req.username, "username")?;
    // Passwords are taken verbatim, never trimmed.
    let password = req
        .password
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| missing("password"))?;

    let response = blocking(&state, move |db| {
        if db.get_user_by_username(&username)?.is_some() {
            return Err(duplicate_username(&username));
        }
        if !password_meets_policy(&password) {
            return Err(ApiError::validation(PASSWORD_POLICY));
        }

        let password_hash = hash_password(&password)?;
        let access_token = generate_access_token();
        let user_id = Uuid::new_v4().to_string();

        match db.create_user(&user_id, &username, &password_hash, &access_token)? {
            UserWrite::Written => Ok(RegisterResponse {
                username,
                id: user_id,
                access_token,
            }),
            // Lost a race with a concurrent registration
            _ => Err(duplicate_username(&username)),
        }
    })
    .await?;

    info!("Registered user {} ({})", response.username, response.id);
    Ok((StatusCode::CREATED, Json(Envelope::ok(response))))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = required(req.username, "username")?;
    let password = req
        .password
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| missing("password"))?;

    let response = blocking(&state, move |db| {
        let user = db.get_user_by_username(&username)?.ok_or_else(|| {
            ApiError::NotFound("User not found, please register for an account".into())
        })?;

        if !verify_password(&password, &user.password)? {
            return Err(ApiError::Unauthorized("Incorrect password".into()));
        }

        let (hives, gifts) = db.owned_ids(&user.id)?;
        Ok(LoginResponse {
            id: user.id,
            username: user.username,
            access_token: user.access_token,
            hives,
            gifts,
        })
    })
    .await?;

    info!("User {} logged in", response.username);
    Ok((StatusCode::CREATED, Json(Envelope::ok(response))))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id.clone();
    let (hives, gifts) = blocking(&state, move |db| Ok(db.owned_ids(&user_id)?)).await?;

    Ok(Json(DashboardResponse {
        message: format!("Welcome to your Dashboard, {}!", user.username),
        hives_count: hives.len(),
        gifts_count: gifts.len(),
        hives,
        gifts,
    }))
}

/// Change the caller's own username and/or password.
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if id != user.id {
        return Err(user_not_found());
    }

    let username = non_blank(req.username, "username")?;
    if let Some(password) = &req.password {
        if !password_meets_policy(password) {
            return Err(ApiError::validation(PASSWORD_POLICY));
        }
    }
    let password = req.password;

    let summary = blocking(&state, move |db| {
        let password_hash = password.as_deref().map(hash_password).transpose()?;

        match db.update_user(&id, username.as_deref(), password_hash.as_deref())? {
            UserWrite::Written => {}
            UserWrite::UsernameTaken => {
                return Err(ApiError::Duplicate("Username already exists".into()));
            }
            UserWrite::NotFound => return Err(user_not_found()),
        }

        let row = db.get_user_by_id(&id)?.ok_or_else(user_not_found)?;
        Ok(UserSummary {
            id: row.id,
            username: row.username,
        })
    })
    .await?;

    info!("Updated user {}", summary.id);
    Ok(Json(Envelope::ok(summary)))
}

/// Delete the caller's account together with all their hives and gifts.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    if id != user.id {
        return Err(user_not_found());
    }

    let deleted = blocking(&state, move |db| Ok(db.delete_user(&id)?)).await?;
    if !deleted {
        return Err(user_not_found());
    }

    info!("Deleted user {} ({})", user.username, user.id);
    Ok(Json(Envelope::ok(MessageBody {
        message: format!("User with username {} deleted successfully", user.username),
    })))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ApiError> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn generate_access_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn duplicate_username(username: &str) -> ApiError {
    ApiError::Duplicate(format!("User with the username {} already exists", username))
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found or unauthorized.".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_policy() {
        assert!(password_meets_policy("Abcdefg1"));
        assert!(password_meets_policy("Passw0rd"));
        assert!(!password_meets_policy("short1"));
        assert!(!password_meets_policy("alllowercase1"));
        assert!(!password_meets_policy("ALLUPPERCASE1"));
        assert!(!password_meets_policy("NoDigitsHere"));
    }

    #[test]
    fn hash_is_not_plaintext_and_verifies() {
        let hash = hash_password("Passw0rd").unwrap();
        assert_ne!(hash, "Passw0rd");
        assert!(verify_password("Passw0rd", &hash).unwrap());
        assert!(!verify_password("passw0rd", &hash).unwrap());
    }

    #[test]
    fn tokens_are_long_and_distinct() {
        let a = generate_access_token();
        let b = generate_access_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert_ne!(a, b);
    }
}
