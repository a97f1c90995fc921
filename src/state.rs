use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::JwtAuth;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::stores::{
    connect_mongo, InMemoryProductStore, InMemorySaleStore, InMemoryUserStore, MongoSaleStore,
    MongoUserStore, MySqlProductStore, ProductStore, SaleStore, UserStore,
};

/// Shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub products: Arc<dyn ProductStore>,
    pub users: Arc<dyn UserStore>,
    pub sales: Arc<dyn SaleStore>,
    pub engine: Engine,
    pub tokens: Arc<JwtAuth>,
    pub low_stock_threshold: i64,
}

impl AppState {
    pub fn new(
        products: Arc<dyn ProductStore>,
        users: Arc<dyn UserStore>,
        sales: Arc<dyn SaleStore>,
        tokens: JwtAuth,
        low_stock_threshold: i64,
    ) -> Self {
        Self {
            engine: Engine::new(products.clone(), sales.clone()),
            products,
            users,
            sales,
            tokens: Arc::new(tokens),
            low_stock_threshold,
        }
    }

    /// All three stores in memory.
    pub fn in_memory(config: &Config) -> Self {
        Self::new(
            Arc::new(InMemoryProductStore::new()),
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemorySaleStore::new()),
            JwtAuth::new(config.jwt_secret.as_bytes()),
            config.low_stock_threshold,
        )
    }

    /// Picks each store once: the database when it is configured, memory
    /// otherwise.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let products: Arc<dyn ProductStore> = match &config.database_url {
            Some(url) => Arc::new(MySqlProductStore::connect(url).await?),
            None => {
                warn!("DATABASE_URL not set, catalog is kept in memory and lost on restart");
                Arc::new(InMemoryProductStore::new())
            }
        };

        let (users, sales): (Arc<dyn UserStore>, Arc<dyn SaleStore>) = match &config.mongodb_uri {
            Some(uri) => {
                let database = connect_mongo(uri, &config.mongodb_database).await?;
                (
                    Arc::new(MongoUserStore::new(&database)),
                    Arc::new(MongoSaleStore::new(&database)),
                )
            }
            None => {
                warn!("MONGODB_URI not set, users and sales are kept in memory and lost on restart");
                (
                    Arc::new(InMemoryUserStore::new()),
                    Arc::new(InMemorySaleStore::new()),
                )
            }
        };

        info!(
            products = products.backend(),
            users = users.backend(),
            sales = sales.backend(),
            "stores selected"
        );

        Ok(Self::new(
            products,
            users,
            sales,
            JwtAuth::new(config.jwt_secret.as_bytes()),
            config.low_stock_threshold,
        ))
    }
}
