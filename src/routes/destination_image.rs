use std::env;

use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

const UNSPLASH_RANDOM_URL: &str = "https://api.unsplash.com/photos/random";

#[derive(Deserialize)]
pub struct QueryParams {
    destination: Option<String>,
}

#[derive(Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
}

#[derive(Deserialize)]
struct UnsplashUrls {
    regular: String,
}

async fn random_photo(
    http_client: &reqwest::Client,
    access_key: &str,
    query: &str,
) -> Option<String> {
    let response = http_client
        .get(UNSPLASH_RANDOM_URL)
        .query(&[("query", query), ("orientation", "landscape")])
        .header("Authorization", format!("Client-ID {}", access_key))
        .send()
        .await
        .ok()?;

    if !response.status().is_success() {
        return None;
    }
    let photo: UnsplashPhoto = response.json().await.ok()?;
    Some(photo.urls.regular)
}

/// Hero image for the itinerary header. Purely cosmetic, so every failure
/// collapses to `{"url": null}` rather than an error status.
pub async fn destination_image(
    data: web::Data<AppState>,
    params: web::Query<QueryParams>,
) -> impl Responder {
    let destination = match params.destination.as_deref().map(str::trim) {
        Some(destination) if !destination.is_empty() => destination.to_string(),
        _ => return HttpResponse::Ok().json(json!({ "url": null })),
    };

    let access_key = match env::var("UNSPLASH_ACCESS_KEY") {
        Ok(key) => key,
        Err(_) => {
            eprintln!("UNSPLASH_ACCESS_KEY is not configured; destination images disabled");
            return HttpResponse::Ok().json(json!({ "url": null }));
        }
    };

    // Cityscape shots first, generic landmarks as the fallback.
    let cityscape = format!("{} cityscape", destination);
    let url = match random_photo(&data.http_client, &access_key, &cityscape).await {
        Some(url) => Some(url),
        None => {
            let landmark = format!("{} landmark", destination);
            random_photo(&data.http_client, &access_key, &landmark).await
        }
    };

    HttpResponse::Ok().json(json!({ "url": url }))
}
