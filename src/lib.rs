pub mod config;
pub mod download;
pub mod error;
pub mod http;
pub mod loaders;
pub mod maven;
pub mod natives;
pub mod version;
