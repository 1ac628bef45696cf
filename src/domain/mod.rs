// Domain layer: availability models and the ports the scraper drives.

pub mod model;
pub mod ports;
