mod app_error;
mod fleet_error;

pub use app_error::{AppError, FLEET_UNAVAILABLE_MESSAGE};
pub use fleet_error::{FailureClass, FleetError};

pub type ApiResult<T> = Result<T, AppError>;
