#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the generic map API.
//!
//! Serves every configured feature layer under `/api/layers/{layer}/`:
//! layer metadata, viewport-filtered (and optionally clustered) item
//! lists, bounding-box summaries, and single-item details. Layers are
//! loaded once at startup and shared read-only across workers.

mod handlers;

use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use generic_map_api_layers::LayerRegistry;

/// Shared application state.
pub struct AppState {
    /// Every configured layer.
    pub layers: LayerRegistry,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/layers", web::get().to(handlers::layers))
            .route("/layers/{layer}/_meta", web::get().to(handlers::meta))
            .route(
                "/layers/{layer}/_meta/parametrized",
                web::get().to(handlers::parametrized_meta),
            )
            .route(
                "/layers/{layer}/_meta/query_param/{name}/options",
                web::get().to(handlers::query_param_options),
            )
            .route("/layers/{layer}/bounds", web::get().to(handlers::bounds))
            .route("/layers/{layer}/items/{id}", web::get().to(handlers::item))
            .route("/layers/{layer}/", web::get().to(handlers::list))
            .route("/layers/{layer}", web::get().to(handlers::list)),
    );
}

/// Starts the generic map API server.
///
/// Reads `LAYERS_CONFIG` (default `layers.toml`), `BIND_ADDR` (default
/// `127.0.0.1`), and `PORT` (default `8080`) from the environment, loads
/// every configured layer, and starts the Actix-Web HTTP server. This is
/// a regular async function; the caller provides the async runtime (e.g.
/// via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the layers configuration or any layer data file fails to
/// load.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let layers_config = std::env::var("LAYERS_CONFIG")
        .map_or_else(|_| PathBuf::from("layers.toml"), PathBuf::from);

    log::info!("Loading layers from {}...", layers_config.display());
    let layers = LayerRegistry::load(&layers_config).expect("Failed to load layers");

    let state = web::Data::new(AppState { layers });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
