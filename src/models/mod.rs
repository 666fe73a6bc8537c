pub mod dtos;
pub mod fleet;

pub use fleet::{Device, DeviceLocation, Position, SessionInfo};
