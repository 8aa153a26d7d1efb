use std::env;
use std::sync::Arc;

use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{cookie::Key, middleware::Logger, web, App, HttpResponse, HttpServer, Responder};
use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use p2p_escrow::config::TimeoutConfig;
use p2p_escrow::db::{create_pool, run_migrations};
use p2p_escrow::handlers::{chat, disputes, notifications, offers, orders};
use p2p_escrow::services::deadline_monitor::DeadlineMonitor;
use p2p_escrow::services::notifier::Notifier;

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "p2p_escrow.db".to_string());
    let pool = create_pool(&database_url)?;
    run_migrations(&pool)?;
    info!("database ready at {database_url}");

    let config = TimeoutConfig::from_env();
    let notifier = Arc::new(Notifier::new(pool.clone()));

    let monitor = Arc::new(DeadlineMonitor::new(
        pool.clone(),
        Arc::clone(&notifier),
        config.clone(),
    ));
    tokio::spawn(monitor.start_monitoring());

    // Session cookies carry only the user id; the platform's auth
    // layer is responsible for setting it.
    let session_key = match env::var("SESSION_SECRET") {
        Ok(secret) if secret.len() >= 64 => Key::from(secret.as_bytes()),
        _ => {
            warn!("SESSION_SECRET missing or too short, using an ephemeral key");
            Key::generate()
        }
    };

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    info!("starting server on {bind_addr}");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(SessionMiddleware::new(
                CookieSessionStore::default(),
                session_key.clone(),
            ))
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::from(Arc::clone(&notifier)))
            .route("/health", web::get().to(health_check))
            .service(
                web::scope("/api")
                    .configure(offers::configure_offer_routes)
                    .configure(orders::configure_order_routes)
                    .configure(disputes::configure_dispute_routes)
                    .configure(chat::configure_chat_routes)
                    .configure(notifications::configure_notification_routes),
            )
    })
    .bind(&bind_addr)
    .context("Failed to bind server address")?
    .run()
    .await?;

    Ok(())
}
