pub mod auth;
pub mod config;
pub mod dto;
pub mod engine;
pub mod error;
pub mod password;
pub mod reports;
pub mod routes;
pub mod seed;
pub mod server;
pub mod state;
pub mod stores;

pub use config::Config;
pub use engine::{CartLine, Engine};
pub use error::Error;
pub use server::{router, run};
pub use state::AppState;
