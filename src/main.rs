use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::io;
use tracing::info;
use tracing_subscriber::EnvFilter;

use billsplit::config::Config;
use billsplit::routes;
use billsplit::store::BillStore;

fn cors(config: &Config) -> Cors {
    match &config.cors_origin {
        Some(origin) => Cors::default()
            .allowed_origin(origin)
            .allow_any_method()
            .allow_any_header(),
        None => Cors::permissive(),
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    info!(database = %config.database, "Using the configured MongoDB deployment");

    let store = BillStore::connect(&config)
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    info!("Connected");

    let address = (config.bind_address.clone(), config.port);
    info!(host = %address.0, port = address.1, "Listening");
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&config))
            .wrap(Logger::default())
            .app_data(web::Data::new(store.clone()))
            .service(web::scope("/api").configure(routes::configure))
    })
    .bind(address)?
    .run()
    .await
}
