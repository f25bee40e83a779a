// Domain layer: listing model, wire payloads and the ports the adapters implement.

pub mod api;
pub mod model;
pub mod ports;
