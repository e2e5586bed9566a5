use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};
use uuid::Uuid;

use gifthive_types::api::{Envelope, HiveRequest, MessageBody, ShareHiveRequest};

use crate::error::ApiError;
use crate::extract::{ApiJson, required};
use crate::middleware::AuthUser;
use crate::records::{assemble_hive, assemble_hives};
use crate::{AppState, blocking};

pub(crate) fn hive_not_found() -> ApiError {
    ApiError::NotFound("Hive not found".into())
}

pub async fn list_hives(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let hives = blocking(&state, move |db| {
        let rows = db.list_owned_hives(&user.id)?;
        Ok(assemble_hives(db, rows)?)
    })
    .await?;

    Ok(Json(hives))
}

/// One hive the caller owns or that was shared with them.
pub async fn get_hive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let hive = blocking(&state, move |db| {
        let row = db.get_visible_hive(&id, &user.id)?.ok_or_else(hive_not_found)?;
        Ok(assemble_hive(db, row)?)
    })
    .await?;

    Ok(Json(hive))
}

pub async fn create_hive(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<HiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = required(req.name, "name")?;

    let hive = blocking(&state, move |db| {
        let row = db.create_hive(&Uuid::new_v4().to_string(), &user.id, &name)?;
        Ok(assemble_hive(db, row)?)
    })
    .await?;

    info!("Created hive {} ({})", hive.name, hive.id);
    Ok((StatusCode::CREATED, Json(hive)))
}

pub async fn rename_hive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<HiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = required(req.name, "name")?;

    let hive = blocking(&state, move |db| {
        let row = db.rename_hive(&id, &user.id, &name)?.ok_or_else(hive_not_found)?;
        Ok(assemble_hive(db, row)?)
    })
    .await?;

    Ok(Json(hive))
}

/// Delete an owned hive and every gift in it.
pub async fn delete_hive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let hive_id = id.clone();
    let deleted = blocking(&state, move |db| Ok(db.delete_hive(&hive_id, &user.id)?)).await?;
    if !deleted {
        return Err(hive_not_found());
    }

    info!("Deleted hive {}", id);
    Ok(Json(Envelope::ok(MessageBody {
        message: "Hive deleted".into(),
    })))
}

/// Give another user read access to an owned hive.
pub async fn share_hive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<ShareHiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = required(req.username, "username")?;
    if username == user.username {
        return Err(ApiError::validation("You cannot share a hive with yourself"));
    }

    let hive = blocking(&state, move |db| {
        let grantee = db
            .get_user_by_username(&username)?
            .ok_or_else(|| ApiError::NotFound(format!("User {} not found", username)))?;

        if !db.share_hive(&id, &user.id, &grantee.id)? {
            return Err(hive_not_found());
        }
        debug!("Hive {} shared with {}", id, grantee.username);

        let row = db.get_owned_hive(&id, &user.id)?.ok_or_else(hive_not_found)?;
        Ok(assemble_hive(db, row)?)
    })
    .await?;

    Ok(Json(hive))
}

pub async fn list_shared_hives(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let hives = blocking(&state, move |db| {
        let rows = db.list_shared_hives(&user.id)?;
        Ok(assemble_hives(db, rows)?)
    })
    .await?;

    Ok(Json(hives))
}
