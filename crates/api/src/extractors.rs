//! Request extractors.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::response::ApiError;

/// JSON body that has passed its `validator` rules.
///
/// Malformed JSON and rule violations are both reported as `VALID_001`.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        value.validate().map_err(|errors| {
            let details = errors
                .field_errors()
                .into_iter()
                .flat_map(|(field, errs)| {
                    errs.iter().map(move |e| match &e.message {
                        Some(msg) => format!("{}: {}", field, msg),
                        None => format!("{}: {}", field, e.code),
                    })
                })
                .collect();
            ApiError::validation(details)
        })?;

        Ok(ValidatedJson(value))
    }
}

/// Client IP address.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl ClientIp {
    /// Key used to bucket requests from this client.
    pub fn bucket_key(&self) -> &str {
        self.0.as_deref().unwrap_or("unknown")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Proxied requests: first hop in X-Forwarded-For
        if let Some(ip) = parts
            .headers
            .get("X-Forwarded-For")
            .and_then(|h| h.to_str().ok())
            .and_then(|xff| xff.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return Ok(ClientIp(Some(ip.to_string())));
        }

        if let Some(ip) = parts
            .headers
            .get("X-Real-IP")
            .and_then(|h| h.to_str().ok())
        {
            return Ok(ClientIp(Some(ip.trim().to_string())));
        }

        Ok(ClientIp(None))
    }
}
