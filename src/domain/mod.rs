// Domain layer: license models and ports.

pub mod model;
pub mod ports;
