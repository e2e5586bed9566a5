use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use gifthive_db::models::GiftPatch;
use gifthive_types::api::{
    CreateGiftRequest, Envelope, GiftQuery, MarkGiftRequest, MessageBody, UpdateGiftRequest,
};
use gifthive_types::models::Gift;

use crate::error::ApiError;
use crate::extract::{ApiJson, non_blank, required};
use crate::hives::hive_not_found;
use crate::middleware::AuthUser;
use crate::records::gift_from_row;
use crate::{AppState, blocking};

fn gift_not_found() -> ApiError {
    ApiError::NotFound("Gift not found".into())
}

/// Gifts across the caller's hives, optionally narrowed to one hive.
pub async fn list_gifts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<GiftQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let gifts: Vec<Gift> = blocking(&state, move |db| {
        let rows = db.list_owned_gifts(&user.id, query.hive_id.as_deref())?;
        Ok(rows.into_iter().map(gift_from_row).collect())
    })
    .await?;

    Ok(Json(gifts))
}

pub async fn create_gift(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreateGiftRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = required(req.name, "name")?;
    let hive_id = required(req.hive_id, "hiveId")?;
    let description = req.description;
    let link = req.link;

    let gift = blocking(&state, move |db| {
        let row = db
            .create_gift(
                &Uuid::new_v4().to_string(),
                &user.id,
                &hive_id,
                &name,
                description.as_deref(),
                link.as_deref(),
            )?
            .ok_or_else(hive_not_found)?;
        Ok(gift_from_row(row))
    })
    .await?;

    info!("Created gift {} in hive {}", gift.id, gift.hive_id);
    Ok((StatusCode::CREATED, Json(gift)))
}

pub async fn update_gift(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdateGiftRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = GiftPatch {
        name: non_blank(req.name, "name")?,
        description: req.description,
        link: req.link,
        bought: req.bought,
    };

    let gift = blocking(&state, move |db| {
        let row = db.update_gift(&id, &user.id, &patch)?.ok_or_else(gift_not_found)?;
        Ok(gift_from_row(row))
    })
    .await?;

    Ok(Json(gift))
}

pub async fn delete_gift(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let gift_id = id.clone();
    let deleted = blocking(&state, move |db| Ok(db.delete_gift(&gift_id, &user.id)?)).await?;
    if !deleted {
        return Err(gift_not_found());
    }

    info!("Deleted gift {}", id);
    Ok(Json(Envelope::ok(MessageBody {
        message: "Gift deleted".into(),
    })))
}

/// Toggle `bought` on a gift in a hive someone shared with the caller.
pub async fn mark_shared_gift(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<MarkGiftRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let gift = blocking(&state, move |db| {
        let row = db
            .mark_shared_gift(&id, &user.id, req.bought)?
            .ok_or_else(gift_not_found)?;
        Ok(gift_from_row(row))
    })
    .await?;

    Ok(Json(gift))
}
