use std::num::NonZeroU32;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, Method},
};
use serde_json::Value;
use url::form_urlencoded;

use super::ApiError;

/// `url` and `resolution` as sent by the client, not validated yet.
///
/// GET reads the query string. POST reads a JSON or form body, and takes
/// the fields the body lacks from the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadParams {
    pub url: Option<String>,
    pub resolution: Option<RawResolution>,
}

/// A resolution may be sent as a JSON number or as text.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResolution {
    Number(serde_json::Number),
    Text(String),
}

impl DownloadParams {
    pub fn from_form(data: &[u8]) -> Self {
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(data) {
            match key.as_ref() {
                "url" if params.url.is_none() => params.url = Some(value.into_owned()),
                "resolution" if params.resolution.is_none() => {
                    params.resolution = Some(RawResolution::Text(value.into_owned()))
                }
                _ => {}
            }
        }
        params
    }

    /// Fields of a JSON object; anything else is an empty set of parameters.
    pub fn from_json(data: &[u8]) -> Self {
        let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(data) else {
            return Self::default();
        };

        let url = match object.get("url") {
            Some(Value::String(url)) => Some(url.clone()),
            _ => None,
        };
        let resolution = match object.get("resolution") {
            Some(Value::Number(n)) => Some(RawResolution::Number(n.clone())),
            Some(Value::String(s)) => Some(RawResolution::Text(s.clone())),
            Some(Value::Null) | None => None,
            Some(other) => Some(RawResolution::Text(other.to_string())),
        };

        Self { url, resolution }
    }

    /// Fill the missing fields from `other`
    pub fn or(self, other: Self) -> Self {
        Self {
            url: self.url.or(other.url),
            resolution: self.resolution.or(other.resolution),
        }
    }

    pub fn require_url(&self) -> Result<String, ApiError> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| ApiError::bad_request("URL is required"))
    }

    /// The requested resolution, or `default` if none was sent.
    pub fn resolution_or(&self, default: NonZeroU32) -> Result<NonZeroU32, ApiError> {
        let Some(raw) = &self.resolution else {
            return Ok(default);
        };

        let value = match raw {
            RawResolution::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            RawResolution::Text(s) => s.trim().parse::<i64>().ok(),
        }
        .ok_or_else(|| ApiError::bad_request("Resolution must be a valid integer"))?;

        if value <= 0 {
            return Err(ApiError::bad_request("Resolution must be a positive integer"));
        }

        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| ApiError::bad_request("Resolution must be a valid integer"))
    }
}

#[async_trait]
impl<S> FromRequest<S> for DownloadParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let query = req
            .uri()
            .query()
            .map(|query| Self::from_form(query.as_bytes()))
            .unwrap_or_default();

        if req.method() != Method::POST {
            return Ok(query);
        }

        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim_start().starts_with("application/json"));

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

        let from_body = if is_json {
            Self::from_json(&body)
        } else {
            Self::from_form(&body)
        };

        Ok(from_body.or(query))
    }
}
