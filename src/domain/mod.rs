// Domain layer: the period mapping, AppEEARS wire models and the ports the
// pipeline is written against.

pub mod model;
pub mod period;
pub mod ports;
