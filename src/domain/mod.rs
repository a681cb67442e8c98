// Domain layer: resource shapes, endpoint descriptors and ports (interfaces).

pub mod endpoint;
pub mod model;
pub mod ports;
