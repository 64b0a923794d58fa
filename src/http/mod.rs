pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod remap;
pub mod request;
pub mod response;
