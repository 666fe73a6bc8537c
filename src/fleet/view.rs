//! Derived, read-only views over a reconciled fleet: status categories,
//! filtering by status and search text, and the rows the dashboard renders.

use crate::models::dtos::fleet::{StatusOptionDto, StatusTone, VehicleDto, ViewportDto};
use crate::models::fleet::{Device, DeviceLocation};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::borrow::Cow;
use std::collections::HashSet;

pub const ALL_STATUSES: &str = "all";
pub const UNKNOWN_STATUS: &str = "unknown";

const DEFAULT_CENTER: [f64; 2] = [20.5937, 78.9629];
const DEFAULT_ZOOM: u8 = 3;
const FOCUSED_ZOOM: u8 = 5;

/// Trimmed, lower-cased device status, `unknown` when absent or blank.
pub fn normalized_status(device: &Device) -> String {
    match device.status.as_deref().map(str::trim) {
        Some(status) if !status.is_empty() => status.to_lowercase(),
        _ => UNKNOWN_STATUS.to_string(),
    }
}

/// The label a device is listed under: its name, else `Device #<id>`.
pub fn display_name(device: &Device) -> Cow<'_, str> {
    match device.name.as_deref() {
        Some(name) if !name.is_empty() => Cow::Borrowed(name),
        _ => Cow::Owned(format!("Device #{}", device.id)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(String),
}

impl StatusFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|it| it.trim().to_lowercase()) {
            None => Self::All,
            Some(value) if value.is_empty() || value == ALL_STATUSES => Self::All,
            Some(value) => Self::Only(value),
        }
    }
    pub fn matches(&self, status: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => expected == status,
        }
    }
}

/// `all` followed by each distinct normalized status in first-seen order.
pub fn status_options(locations: &[DeviceLocation]) -> Vec<String> {
    let mut seen = HashSet::from([ALL_STATUSES.to_string()]);
    let mut options = vec![ALL_STATUSES.to_string()];
    for location in locations {
        let status = normalized_status(&location.device);
        if seen.insert(status.clone()) {
            options.push(status);
        }
    }
    options
}

/// Keeps the entries matching both the status filter and the search text,
/// preserving input order.
pub fn filter_locations<'a>(
    locations: &'a [DeviceLocation],
    filter: &StatusFilter,
    query: &str,
) -> Vec<&'a DeviceLocation> {
    let query = query.trim().to_lowercase();
    locations
        .iter()
        .filter(|location| filter.matches(&normalized_status(&location.device)))
        .filter(|location| query.is_empty() || matches_query(location, &query))
        .collect()
}

fn matches_query(location: &DeviceLocation, query: &str) -> bool {
    display_name(&location.device).to_lowercase().contains(query)
        || location
            .position
            .address
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
            .contains(query)
}

/// Human label for a normalized status. Unrecognised values pass through.
pub fn status_label(status: &str) -> Cow<'_, str> {
    let label = match status {
        "moving" => "Moving",
        "idling" => "Idling",
        "stopped" => "Stopped",
        "no-signal" => "No Signal",
        "online" => "Online",
        "offline" => "Offline",
        other => return Cow::Borrowed(other),
    };
    Cow::Borrowed(label)
}

pub fn status_tone(status: &str) -> StatusTone {
    match status {
        "moving" | "online" => StatusTone::Active,
        "idling" | "idle" => StatusTone::Idle,
        "stopped" | "offline" => StatusTone::Halted,
        _ => StatusTone::Muted,
    }
}

/// Tab caption for a status option: capitalised, first `-` turned into a space.
pub fn status_option_label(status: &str) -> String {
    let mut chars = status.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest = chars.as_str().replacen('-', " ", 1);
    first.to_uppercase().chain(rest.chars()).collect()
}

fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|it| it.and_utc())
}

/// `Jan 02, 2024, 08:30 AM` in UTC, or `Unknown`.
pub fn format_last_seen(timestamp: Option<&str>) -> String {
    timestamp
        .and_then(parse_timestamp)
        .map(|it| it.format("%b %d, %Y, %I:%M %p").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn vehicle_row(location: &DeviceLocation) -> VehicleDto {
    let device = &location.device;
    let position = &location.position;
    let status = normalized_status(device);
    VehicleDto {
        id: device.id,
        name: display_name(device).into_owned(),
        status_label: status_label(&status).into_owned(),
        status_tone: status_tone(&status),
        status,
        latitude: location.latitude(),
        longitude: location.longitude(),
        speed_kmh: position.speed.unwrap_or(0.0).round() as i64,
        course: position.course,
        address: position
            .address
            .clone()
            .unwrap_or_else(|| "No address available".to_string()),
        last_seen: format_last_seen(
            device
                .last_update
                .as_deref()
                .or(position.device_time.as_deref()),
        ),
    }
}

/// Map framing: the first vehicle at a close zoom, else a country-wide default.
pub fn viewport(locations: &[DeviceLocation]) -> ViewportDto {
    match locations.first() {
        Some(first) => ViewportDto {
            center: [first.latitude(), first.longitude()],
            zoom: FOCUSED_ZOOM,
        },
        None => ViewportDto {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        },
    }
}

pub struct FleetView {
    pub status_options: Vec<StatusOptionDto>,
    pub vehicles: Vec<VehicleDto>,
    pub total: usize,
    pub viewport: ViewportDto,
}

/// Everything the dashboard needs from one snapshot and the current filters.
pub fn render(locations: &[DeviceLocation], filter: &StatusFilter, query: &str) -> FleetView {
    let status_options = status_options(locations)
        .into_iter()
        .map(|value| StatusOptionDto {
            label: status_option_label(&value),
            value,
        })
        .collect();
    let vehicles = filter_locations(locations, filter, query)
        .into_iter()
        .map(vehicle_row)
        .collect::<Vec<_>>();
    FleetView {
        status_options,
        total: locations.len(),
        vehicles,
        viewport: viewport(locations),
    }
}
