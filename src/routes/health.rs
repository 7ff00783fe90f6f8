use std::collections::HashMap;
use std::env;

use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthStatus {
    status: String,
    services: HashMap<String, ServiceStatus>,
    environment: String,
    version: String,
}

#[derive(Serialize, Clone)]
struct ServiceStatus {
    status: String,
    details: Option<String>,
}

fn check_env_key(name: &str) -> ServiceStatus {
    match env::var(name) {
        Ok(_) => ServiceStatus {
            status: "ok".to_string(),
            details: None,
        },
        Err(_) => ServiceStatus {
            status: "unconfigured".to_string(),
            details: Some(format!("{} is not set", name)),
        },
    }
}

pub async fn health_check(data: web::Data<AppState>) -> impl Responder {
    let mut health = HealthStatus {
        status: "ok".to_string(),
        services: HashMap::new(),
        environment: env::var("RUST_ENV").unwrap_or("development".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    health.services.insert(
        "ai_model".to_string(),
        if data.model.is_some() {
            ServiceStatus {
                status: "ok".to_string(),
                details: None,
            }
        } else {
            ServiceStatus {
                status: "unconfigured".to_string(),
                details: Some("GOOGLE_AI_API_KEY is not set".to_string()),
            }
        },
    );
    health.services.insert(
        "places".to_string(),
        check_env_key("GOOGLE_PLACES_API_KEY"),
    );
    health
        .services
        .insert("autocomplete".to_string(), check_env_key("GEOAPIFY_API_KEY"));
    health
        .services
        .insert("images".to_string(), check_env_key("UNSPLASH_ACCESS_KEY"));

    if health
        .services
        .values()
        .any(|service| service.status != "ok")
    {
        health.status = "degraded".to_string();
    }

    HttpResponse::Ok().json(health)
}
