use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, StatusCode};
use serde_json::Value;

use super::{Authenticator, BookingBackend};
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::{Instructor, SwapConflict, SwapRequest};

pub struct HttpBackend {
    base_url: String,
    token: RwLock<String>,
    authenticator: Option<Arc<dyn Authenticator>>,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(token),
            authenticator: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            ..Self::new(config.api_base_url.clone(), config.api_token.clone())
        })
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// `GET /auth/me`; returns the signed-in user.
    pub async fn verify_connection(&self) -> Result<Value, AppError> {
        self.request(Method::GET, "/auth/me", None, None).await
    }

    /// One call with a single token refresh and replay on 401.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        idempotency_key: Option<&str>,
    ) -> Result<Value, AppError> {
        let (mut status, mut data) = self.send(method.clone(), path, body, idempotency_key).await?;

        if status == StatusCode::UNAUTHORIZED {
            if let Some(authenticator) = &self.authenticator {
                let token = authenticator
                    .refresh_token()
                    .await
                    .map_err(|e| AppError::Auth(e.to_string()))?;
                *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
                tracing::info!(path, "token refreshed after 401, replaying request");
                (status, data) = self.send(method, path, body, idempotency_key).await?;
            }
        }

        if status.is_success() {
            Ok(data)
        } else {
            let err = error_for(status, &data);
            tracing::debug!(path, status = status.as_u16(), error = %err, "backend call failed");
            Err(err)
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        idempotency_key: Option<&str>,
    ) -> Result<(StatusCode, Value), AppError> {
        let token = self.token.read().unwrap_or_else(|e| e.into_inner()).clone();

        let mut req = self.client.request(method, format!("{}{}", self.base_url, path));
        if !token.is_empty() {
            req = req.bearer_auth(token);
        }
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let data = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, data))
    }
}

#[async_trait]
impl BookingBackend for HttpBackend {
    async fn list_bookings(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>, AppError> {
        let path = format!(
            "/bookings?start_date={}&end_date={}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );
        let data = self.request(Method::GET, &path, None, None).await?;
        Ok(into_list(data, &["bookings", "data"]))
    }

    async fn create_booking(&self, payload: &Value) -> Result<Value, AppError> {
        self.request(Method::POST, "/bookings", Some(payload), None).await
    }

    async fn create_group_booking(&self, payload: &Value) -> Result<Value, AppError> {
        self.request(Method::POST, "/bookings/group", Some(payload), None).await
    }

    async fn update_booking(
        &self,
        id: &str,
        patch: &Value,
        idempotency_key: &str,
    ) -> Result<Value, AppError> {
        let path = format!("/bookings/{id}");
        self.request(Method::PATCH, &path, Some(patch), Some(idempotency_key))
            .await
    }

    async fn delete_booking(&self, id: &str) -> Result<(), AppError> {
        let path = format!("/bookings/{id}");
        self.request(Method::DELETE, &path, None, None).await?;
        Ok(())
    }

    async fn swap_bookings(&self, request: &SwapRequest) -> Result<Value, AppError> {
        let body = serde_json::to_value(request)?;
        self.request(Method::POST, "/bookings/swap", Some(&body), None)
            .await
    }

    async fn list_instructors(&self) -> Result<Vec<Instructor>, AppError> {
        let data = self
            .request(Method::GET, "/users?role=instructor", None, None)
            .await?;
        Ok(into_list(data, &["users", "data"])
            .iter()
            .filter_map(Instructor::from_value)
            .collect())
    }
}

/// Lists arrive bare or wrapped under one of `keys`.
fn into_list(data: Value, keys: &[&str]) -> Vec<Value> {
    match data {
        Value::Array(items) => items,
        Value::Object(mut obj) => keys
            .iter()
            .find_map(|k| match obj.remove(*k) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn error_for(status: StatusCode, body: &Value) -> AppError {
    let message = body
        .get("error")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| match body {
            Value::String(s) => s.clone(),
            Value::Null => status.to_string(),
            other => other.to_string(),
        });

    match status {
        StatusCode::UNAUTHORIZED => AppError::Unauthorized,
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited(message),
        StatusCode::CONFLICT => match SwapConflict::from_value(body) {
            Some(conflict) => AppError::SwapConflict(conflict),
            None => AppError::Backend {
                status: status.as_u16(),
                message,
            },
        },
        _ => AppError::Backend {
            status: status.as_u16(),
            message,
        },
    }
}
