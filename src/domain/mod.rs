// Domain layer: licensing records, aggregated tables and the ports the pipeline talks through.

pub mod model;
pub mod ports;
