use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};

use gifthive_types::api::SearchQuery;

use crate::error::ApiError;
use crate::extract::required;
use crate::middleware::AuthUser;
use crate::records::assemble_hives;
use crate::{AppState, blocking};

/// Hives visible to the caller matching `searchTerm` by name or id.
pub async fn search(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let term = required(query.search_term, "searchTerm")?;

    let hives = blocking(&state, move |db| {
        let rows = db.search_hives(&user.id, &term)?;
        if rows.is_empty() {
            return Err(ApiError::NotFound(format!("No hives matching '{}'", term)));
        }
        Ok(assemble_hives(db, rows)?)
    })
    .await?;

    Ok(Json(hives))
}
