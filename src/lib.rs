pub mod api;
pub mod auth;
pub mod backend;
pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod export;
pub mod external;
pub mod samples;
pub mod server;
