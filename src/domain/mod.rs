// Domain layer: the port model and the component trait seams.

pub mod model;
pub mod ports;
