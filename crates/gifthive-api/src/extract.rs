use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::ApiError;

/// `Json<T>` whose rejection is reported through [`ApiError`], so a bad body
/// gets the same envelope as every other validation failure.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::Validation {
                message: "Invalid request body".into(),
                errors: Some(Value::String(rejection.body_text())),
            }),
        }
    }
}

/// Unwrap a required string field, rejecting absent and blank values.
/// The returned value is trimmed.
pub fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(missing(field)),
    }
}

pub fn missing(field: &str) -> ApiError {
    ApiError::Validation {
        message: "Please fill in all required fields".into(),
        errors: Some(json!({ field: "required" })),
    }
}

/// Same as [`required`] but only when the field was sent at all.
pub fn non_blank(value: Option<String>, field: &str) -> Result<Option<String>, ApiError> {
    match value {
        Some(v) => required(Some(v), field).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required(Some("  Birthday ".into()), "name").unwrap(), "Birthday");
        assert!(required(Some("   ".into()), "name").is_err());
        assert!(required(None, "name").is_err());
    }

    #[test]
    fn non_blank_passes_absent_fields() {
        assert_eq!(non_blank(None, "name").unwrap(), None);
        assert!(non_blank(Some("".into()), "name").is_err());
    }
}
