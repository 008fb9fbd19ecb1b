use crate::models::SwapConflict;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("booking conflict: instructor {instructor} is already booked on {date} at {time}")]
    Conflict {
        instructor: String,
        date: String,
        time: String,
        conflicting_ids: Vec<String>,
    },

    #[error("{0}")]
    SwapConflict(SwapConflict),

    #[error("booking {0} has another change in flight")]
    Busy(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// 429 and 5xx are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::RateLimited(_) => true,
            AppError::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict { .. } | AppError::SwapConflict(_))
    }

    /// Text the calendar can show. Expected outcomes keep their detail;
    /// anything unexpected collapses to a generic message.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Conflict { .. } | AppError::SwapConflict(_) => self.to_string(),
            AppError::Busy(_) => {
                "This booking is already being changed. Please wait a moment.".to_string()
            }
            AppError::NotFound(_) => "That booking no longer exists.".to_string(),
            AppError::Unauthorized | AppError::Auth(_) => {
                "Your session has expired. Please sign in again.".to_string()
            }
            AppError::RateLimited(_) => {
                "Too many requests right now. Please try again shortly.".to_string()
            }
            AppError::Backend { .. } | AppError::Http(_) | AppError::Json(_) => {
                "Something went wrong saving your change. Please try again.".to_string()
            }
        }
    }
}
