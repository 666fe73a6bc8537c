use crate::models::fleet::SessionInfo;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Default)]
pub struct SignInDto {
    #[serde(default)]
    pub token: Option<String>,
}

pub type SessionDto = SessionInfo;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct FleetQueryDto {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    Active,
    Idle,
    Halted,
    Muted,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StatusOptionDto {
    pub value: String,
    pub label: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDto {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub status_label: String,
    pub status_tone: StatusTone,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    pub address: String,
    pub last_seen: String,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ViewportDto {
    pub center: [f64; 2],
    pub zoom: u8,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FleetViewDto {
    pub phase: &'static str,
    pub refreshing: bool,
    pub status_options: Vec<StatusOptionDto>,
    pub vehicles: Vec<VehicleDto>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub viewport: ViewportDto,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RedirectDto {
    pub message: &'static str,
    pub redirect: String,
}
