pub mod http;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::{Instructor, SwapRequest};

/// The REST surface the booking core depends on. Records come back raw; the
/// standardizer owns their interpretation.
#[async_trait]
pub trait BookingBackend: Send + Sync {
    async fn list_bookings(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Value>, AppError>;

    async fn create_booking(&self, payload: &Value) -> Result<Value, AppError>;

    async fn create_group_booking(&self, payload: &Value) -> Result<Value, AppError>;

    /// `idempotency_key` is constant across retries of one logical update.
    async fn update_booking(
        &self,
        id: &str,
        patch: &Value,
        idempotency_key: &str,
    ) -> Result<Value, AppError>;


    async fn delete_booking(&self, id: &str) -> Result<(), AppError>;

    /// Both sides in one request. A typed 409 surfaces as
    /// [`AppError::SwapConflict`].
    async fn swap_bookings(&self, request: &SwapRequest) -> Result<Value, AppError>;

    async fn list_instructors(&self) -> Result<Vec<Instructor>, AppError>;
}

/// Supplied by the surrounding auth layer; called once when a request comes
/// back 401.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn refresh_token(&self) -> anyhow::Result<String>;
}
