use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::models::trip::TripParams;
use crate::services::itinerary_generation_service::ItineraryGenerator;
use crate::state::AppState;

pub async fn generate_itinerary(
    data: web::Data<AppState>,
    params: web::Json<TripParams>,
) -> impl Responder {
    let params = params.into_inner();
    if params.destination.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "destination is required"
        }));
    }

    let model = match &data.model {
        Some(model) => model.clone(),
        None => {
            eprintln!("Generation requested but GOOGLE_AI_API_KEY is not configured");
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "AI model is not configured on this server"
            }));
        }
    };

    let generator = ItineraryGenerator::new(model, data.places.clone());
    match generator.generate(&params).await {
        Ok(itinerary) => HttpResponse::Ok().json(json!({
            "success": true,
            "itinerary": itinerary,
            "meta": {
                "destination": params.destination,
                "budget": params.budget,
                "travel_style": params.travel_style
            }
        })),
        Err(err) => {
            eprintln!("Failed to generate itinerary: {}", err);
            if err.is_configuration() {
                HttpResponse::InternalServerError().json(json!({
                    "success": false,
                    "error": "AI model is not configured on this server"
                }))
            } else {
                HttpResponse::BadGateway().json(json!({
                    "success": false,
                    "error": format!("{}", err)
                }))
            }
        }
    }
}
