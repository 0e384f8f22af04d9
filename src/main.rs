use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::utils::email_index;
use crate::utils::image_storage::ImageStorage;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "HR self-service API"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!("Server starting...");

    let pool = init_db(&config).await?;

    if config.run_migrations {
        db::run_migrations(&pool).await?;
    }
    if let Some(admin) = &config.bootstrap_admin {
        db::seed_admin(&pool, admin).await?;
    }

    let pool_for_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        // registrations of the last 30 days are also cached, 250 rows per batch
        if let Err(e) = email_index::warmup(&pool_for_warmup, 30, 250).await {
            error!(error = ?e, "Failed to warm up email index");
        }
    });

    let server_addr = config.server_addr.clone();
    let storage = Data::new(ImageStorage::new(config.image_upload_dir.clone()));
    let config_data = Data::new(config);
    let pool_data = Data::new(pool);

    HttpServer::new(move || {
        let config = config_data.clone();
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(pool_data.clone())
            .app_data(config.clone())
            .app_data(storage.clone())
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
