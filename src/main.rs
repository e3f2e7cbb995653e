// main.rs
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use dotenv::dotenv;

mod config;
mod controllers;
mod error;
mod models;
mod session;
mod utils;

use config::Config;
use session::auth_store::AuthStore;
use session::gateway::GatewayConnector;
use session::{SessionHandle, SessionManager};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("starting up...");

    let config = Config::from_env();

    let connector = match GatewayConnector::new(config.gateway.clone()) {
        Ok(connector) => connector,
        Err(e) => {
            log::error!("Gagal inisialisasi client gateway WhatsApp: {:?}", e);
            std::process::exit(1);
        }
    };

    let manager = Arc::new(SessionManager::new(
        AuthStore::new(&config.auth_dir),
        Arc::new(connector),
        Arc::new(config.reconnect.clone()),
        config.send_timeout,
    ));

    // Sesi WA jalan di background, lepas dari siklus request HTTP
    actix_web::rt::spawn(manager.clone().run());

    let session: Arc<dyn SessionHandle> = manager;
    let session = web::Data::from(session);
    let cors_origin = config.cors_origin.clone();

    log::info!("Relay WhatsApp listen di {}:{}", config.host, config.port);

    HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default().allowed_origin(origin),
            None => Cors::default().allow_any_origin(),
        }
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(3600);

        App::new()
            .app_data(session.clone())
            .app_data(controllers::report_controller::json_config())
            .wrap(cors)
            .wrap(Logger::default())
            .service(controllers::report_controller::get_status)
            .service(controllers::report_controller::send_daily_report)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
