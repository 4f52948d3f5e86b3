pub mod auth;
pub mod cache;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod identity;
pub mod routes;
pub mod server;
pub mod users;

pub use config::Config;
pub use error::AppError;
pub use server::Server;
