//! Access to the upstream fleet telemetry service.

mod client;

pub use client::{HttpFleetClient, with_token};

use crate::errors::FleetError;
use crate::models::fleet::{Device, Position, SessionInfo};
use std::future::Future;

/// The three upstream calls a poll cycle depends on.
pub trait FleetApi: Send + Sync + 'static {
    fn validate_session(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<SessionInfo, FleetError>> + Send;

    fn fetch_devices(&self, token: &str)
    -> impl Future<Output = Result<Vec<Device>, FleetError>> + Send;

    fn fetch_positions(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Vec<Position>, FleetError>> + Send;
}
