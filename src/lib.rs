pub mod auth;
pub mod cli;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod projection;
pub mod wal;
