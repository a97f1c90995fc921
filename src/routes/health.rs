use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::Json;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub databases: Databases,
}

#[derive(Debug, Serialize)]
pub struct Databases {
    pub products: StoreHealth,
    pub accounts: StoreHealth,
}

#[derive(Debug, Serialize)]
pub struct StoreHealth {
    pub backend: &'static str,
    pub status: &'static str,
}

impl StoreHealth {
    fn new(backend: &'static str, ping: Result<()>) -> Self {
        let status = match ping {
            Ok(()) => "connected",
            Err(e) => {
                warn!(backend, error = %e, "store unreachable");
                "disconnected"
            }
        };
        Self { backend, status }
    }

    fn connected(&self) -> bool {
        self.status == "connected"
    }
}

/// `GET /api/health`, open to anyone. Always answers 200; a store that does
/// not respond turns the status to `degraded`.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let (products, accounts) = tokio::join!(state.products.ping(), state.users.ping());
    let databases = Databases {
        products: StoreHealth::new(state.products.backend(), products),
        accounts: StoreHealth::new(state.users.backend(), accounts),
    };
    let status = if databases.products.connected() && databases.accounts.connected() {
        "ok"
    } else {
        "degraded"
    };

    Json(Health {
        status,
        timestamp: Utc::now(),
        databases,
    })
}
