// Core models and the ports the task engine talks through.

pub mod model;
pub mod ports;
