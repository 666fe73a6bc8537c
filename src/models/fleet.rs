use serde::{Deserialize, Deserializer, Serialize};

/// A tracked asset as reported by the upstream fleet service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub last_update: Option<String>,
}

/// One observed location sample. Coordinates that are not JSON numbers are
/// kept as `None` so a single bad record never fails the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default)]
    pub id: Option<i64>,
    pub device_id: i64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub course: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub device_time: Option<String>,
    #[serde(default)]
    pub fix_time: Option<String>,
}

impl Position {
    /// Ordering key between samples of the same device: `deviceTime`, then
    /// `fixTime`, then the empty string.
    pub fn time_key(&self) -> &str {
        self.device_time
            .as_deref()
            .or(self.fix_time.as_deref())
            .unwrap_or("")
    }

    /// Both coordinates present and finite.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Answer of `GET /session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

/// A device paired with its most recent usable position.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceLocation {
    pub device: Device,
    pub position: Position,
    latitude: f64,
    longitude: f64,
}

impl DeviceLocation {
    /// Pairs a device with a position, refusing positions without usable
    /// coordinates.
    pub fn new(device: Device, position: Position) -> Option<Self> {
        let (latitude, longitude) = position.coordinates()?;
        Some(Self {
            device,
            position,
            latitude,
            longitude,
        })
    }
    pub fn latitude(&self) -> f64 {
        self.latitude
    }
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}
