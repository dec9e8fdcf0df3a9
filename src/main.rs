//Third-party-dependencies
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use log::{error, info};
use std::time::Duration;

use statroom_service::config::Config;
use statroom_service::routes;
use statroom_service::services::db;
use statroom_service::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    std::fs::create_dir_all("./storage")?;

    let state = match AppState::connect(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("❌ Failed to connect backing services: {}", e);
            std::process::exit(1);
        }
    };

    actix_web::rt::spawn(db::monitor_health(
        state.db.clone(),
        Duration::from_secs(config.db_health_interval_secs),
    ));

    let address = config.address();
    info!("🚀 Server started at {}", address);

    let data = web::Data::new(state.clone());
    let frontend_url = config.frontend_url.clone();

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(data.clone())
            .configure(routes::init_routes)
    })
    .bind(address)?
    .run()
    .await?;

    state.db.close().await;
    Ok(())
}
