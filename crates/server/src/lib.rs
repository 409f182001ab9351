pub mod config;
pub mod download;
pub mod error;
pub mod routes;
pub mod state;
pub mod upload;
