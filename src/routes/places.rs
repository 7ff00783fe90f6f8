use std::env;

use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

const GEOAPIFY_AUTOCOMPLETE_URL: &str = "https://api.geoapify.com/v1/geocode/autocomplete";
const MAX_SUGGESTIONS: usize = 5;

#[derive(Deserialize)]
pub struct QueryParams {
    input: Option<String>,
}

#[derive(Serialize)]
pub struct PlaceSuggestion {
    pub description: String,
    pub city: String,
    pub country: String,
}

#[derive(Deserialize)]
struct GeoapifyResponse {
    #[serde(default)]
    results: Vec<GeoapifyResult>,
}

#[derive(Deserialize)]
struct GeoapifyResult {
    city: Option<String>,
    country: Option<String>,
}

/// City autocomplete for the destination input. Every failure path
/// degrades to an empty list; a broken suggestion box must never block
/// trip planning.
pub async fn autocomplete(
    data: web::Data<AppState>,
    params: web::Query<QueryParams>,
) -> impl Responder {
    let input = match params.input.as_deref().map(str::trim) {
        Some(input) if input.len() >= 2 => input.to_string(),
        _ => return HttpResponse::Ok().json(Vec::<PlaceSuggestion>::new()),
    };

    let api_key = match env::var("GEOAPIFY_API_KEY") {
        Ok(key) => key,
        Err(_) => {
            eprintln!("GEOAPIFY_API_KEY is not configured; autocomplete disabled");
            return HttpResponse::Ok().json(Vec::<PlaceSuggestion>::new());
        }
    };

    let response = data
        .http_client
        .get(GEOAPIFY_AUTOCOMPLETE_URL)
        .query(&[
            ("text", input.as_str()),
            ("type", "city"),
            ("format", "json"),
            ("limit", "20"),
            ("apiKey", api_key.as_str()),
        ])
        .send()
        .await;

    let parsed: GeoapifyResponse = match response {
        Ok(response) => match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                eprintln!("Failed to parse autocomplete response: {}", err);
                return HttpResponse::Ok().json(Vec::<PlaceSuggestion>::new());
            }
        },
        Err(err) => {
            eprintln!("Autocomplete request failed: {}", err);
            return HttpResponse::Ok().json(Vec::<PlaceSuggestion>::new());
        }
    };

    // The API returns one row per locality match; collapse duplicates of
    // the same "City, Country" label and keep the first few.
    let mut suggestions: Vec<PlaceSuggestion> = Vec::new();
    for result in parsed.results {
        let (city, country) = match (result.city, result.country) {
            (Some(city), Some(country)) => (city, country),
            _ => continue,
        };
        let description = format!("{}, {}", city, country);
        if suggestions.iter().any(|s| s.description == description) {
            continue;
        }
        suggestions.push(PlaceSuggestion {
            description,
            city,
            country,
        });
        if suggestions.len() == MAX_SUGGESTIONS {
            break;
        }
    }

    HttpResponse::Ok().json(suggestions)
}
