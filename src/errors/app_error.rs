use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt::{Display, Formatter};

/// Shown to the end user for any fleet loading failure, whichever call failed.
pub const FLEET_UNAVAILABLE_MESSAGE: &str = "Unable to load fleet data. Please sign in again.";

#[derive(Debug)]
pub enum AppError {
    BadRequest(anyhow::Error),
    Internal(anyhow::Error),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(error) => write!(f, "{error}"),
            AppError::Internal(_) => {
                f.write_str("An internal error occurred. Please try again later.")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(err) => {
                tracing::error!("{:?}", err);
                err.chain()
                    .skip(1)
                    .for_each(|cause| tracing::error!("Because: {}", cause));
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        tracing::error!("{}", message);
        (status, message).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn bad_request_shows_its_reason() {
        let error = AppError::BadRequest(anyhow!("A session token is required"));
        assert_eq!(error.to_string(), "A session token is required");
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_cause_is_not_shown() {
        let error = AppError::from(anyhow!("secret stack trace").context("config missing"));
        assert_eq!(
            error.to_string(),
            "An internal error occurred. Please try again later."
        );
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
