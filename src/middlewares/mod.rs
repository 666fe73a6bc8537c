pub mod route_guard;
pub mod trace_id;
