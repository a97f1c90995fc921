use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::routes::{auth, health, products, sales, stats, users};
use crate::seed;
use crate::state::AppState;

pub const BANNER: &str = "Tiendita backend corriendo. Prueba /api/health";

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", get(auth::verify))
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/{id}",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route("/products", get(products::list).post(products::create))
        .route("/products/low-stock", get(products::low_stock))
        .route("/products/barcode/{barcode}", get(products::by_barcode))
        .route("/products/category/{category_id}", get(products::by_category))
        .route(
            "/products/meta/categories",
            get(products::categories).post(products::create_category),
        )
        .route(
            "/products/meta/units",
            get(products::units).post(products::create_unit),
        )
        .route(
            "/products/{id}",
            get(products::get)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/sales", get(sales::list).post(sales::create))
        .route("/sales/today", get(sales::today))
        .route("/sales/filter", get(sales::filter))
        .route("/sales/vendedor/{seller_id}", get(sales::by_seller))
        .route("/sales/report/by-day", get(sales::by_day))
        .route("/sales/report/top-products", get(sales::top_products))
        .route("/sales/{id}", get(sales::get))
        .route("/stats", get(stats::summary))
        .route("/stats/detailed", get(stats::detailed));

    Router::new()
        .route("/", get(|| async { BANNER }))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Connects the stores, seeds them and serves until Ctrl+C or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    info!("Initializing state...");
    let state = AppState::from_config(&config).await?;
    seed::run(&state, &config).await?;

    let app = router(state, &config.cors_origins);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| Error::Config(format!("cannot bind {address}: {e}")))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::internal(format!("server error: {e}")))?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
