use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use devradar::config::{LoggingSettings, Settings};
use devradar::routes::{self, AppState};
use devradar::services::{spawn_sweeper, Directory};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(settings: &LoggingSettings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if settings.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_logging(&settings.logging);
    info!("Starting devradar proximity directory...");

    let directory = Arc::new(Directory::from_settings(&settings));
    info!(
        "Directory initialized (cell: {}°, channel capacity: {})",
        settings.directory.cell_size_deg, settings.subscriptions.channel_capacity
    );

    let sweeper = spawn_sweeper(
        Arc::clone(&directory),
        settings.directory.sweep_interval(),
        settings.directory.record_ttl(),
        settings.subscriptions.idle_timeout(),
    );

    let app_state = AppState {
        directory: Arc::clone(&directory),
        search: settings.search.clone(),
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let result = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(routes::configure_extractors)
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await;

    sweeper.abort();
    directory.shutdown();

    if let Err(ref e) = result {
        error!("HTTP server stopped with error: {}", e);
    }
    result
}
