pub mod http_client;
pub mod instagram;
pub mod registry;
pub mod s3;
pub mod sigv4;
