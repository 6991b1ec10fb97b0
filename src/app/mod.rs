pub mod aggregate;
pub mod fetchers;
pub mod ports;
pub mod sink;
