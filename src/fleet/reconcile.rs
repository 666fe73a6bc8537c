use crate::models::fleet::{Device, DeviceLocation, Position};
use std::collections::HashMap;

/// Picks the latest sample per device in one pass over `positions`.
///
/// The first sample seen for a device is always the initial candidate. A later
/// sample replaces it when its time key is not smaller under plain string
/// comparison, so samples with equal keys resolve to the last one scanned.
pub fn latest_positions(positions: &[Position]) -> HashMap<i64, &Position> {
    let mut latest: HashMap<i64, &Position> = HashMap::with_capacity(positions.len());
    for position in positions {
        match latest.get(&position.device_id) {
            Some(current) if position.time_key() < current.time_key() => {}
            // equal keys fall through, the later sample replaces the earlier
            _ => {
                latest.insert(position.device_id, position);
            }
        }
    }
    latest
}

/// Pairs one device with its candidate sample, or nothing when the device has
/// no sample or the sample lacks usable coordinates.
pub fn locate(device: &Device, latest: &HashMap<i64, &Position>) -> Option<DeviceLocation> {
    let position = latest.get(&device.id)?;
    DeviceLocation::new(device.clone(), (*position).clone())
}

/// Merges devices with their latest usable position, in device order.
pub fn reconcile(devices: &[Device], positions: &[Position]) -> Vec<DeviceLocation> {
    let latest = latest_positions(positions);
    let candidates = devices
        .iter()
        .map(|device| locate(device, &latest))
        .collect::<Vec<_>>();
    let dropped = candidates.iter().filter(|it| it.is_none()).count();
    if dropped > 0 {
        tracing::debug!(
            devices = devices.len(),
            dropped,
            "devices without a usable position were left out"
        );
    }
    candidates.into_iter().flatten().collect()
}
