use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;

use wayfarer_api::routes;
use wayfarer_api::services::gemini_service::{GeminiClient, GenerativeModel};
use wayfarer_api::services::place_validation_service::{GooglePlacesClient, PlaceLookup};
use wayfarer_api::state::AppState;

const HOST: &str = "0.0.0.0";
const PORT: u16 = 8080;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    println!("Application starting...");

    if cfg!(debug_assertions) {
        dotenv::dotenv().ok();
    }

    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let host = std::env::var("HOST").unwrap_or_else(|_| HOST.to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| PORT.to_string())
        .parse()
        .unwrap_or(PORT);

    // A missing AI key degrades the server instead of killing it; the
    // generation endpoints report the misconfiguration per request.
    let model: Option<Arc<dyn GenerativeModel>> = match GeminiClient::new() {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            eprintln!("AI model unavailable: {}", err);
            None
        }
    };

    let places: Arc<dyn PlaceLookup> = match GooglePlacesClient::new() {
        Ok(client) => Arc::new(client),
        Err(err) => {
            eprintln!("Failed to build places client: {}", err);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()));
        }
    };

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;

    println!("Attempting to bind to {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(AppState {
                model: model.clone(),
                places: places.clone(),
                http_client: http_client.clone(),
            }))
            .configure(routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
