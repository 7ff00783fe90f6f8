use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::models::itinerary::Activity;
use crate::services::activity_modification_service::ActivityModificationService;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ModifyActivityRequest {
    activity: Option<Activity>,
    instruction: Option<String>,
}

#[derive(Deserialize)]
pub struct ModifyDayRequest {
    activities: Option<Vec<Activity>>,
    instruction: Option<String>,
    #[serde(rename = "dayTitle", default)]
    day_title: Option<String>,
    #[serde(rename = "dayNumber", default)]
    day_number: Option<u32>,
}

fn model_unavailable() -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({
        "error": "AI model is not configured on this server"
    }))
}

pub async fn modify_activity(
    data: web::Data<AppState>,
    body: web::Json<ModifyActivityRequest>,
) -> impl Responder {
    let body = body.into_inner();
    let (activity, instruction) = match (body.activity, body.instruction) {
        (Some(activity), Some(instruction)) if !instruction.trim().is_empty() => {
            (activity, instruction)
        }
        _ => {
            return HttpResponse::BadRequest().json(json!({
                "error": "activity and instruction are required"
            }))
        }
    };

    let model = match &data.model {
        Some(model) => model.clone(),
        None => return model_unavailable(),
    };

    let service = ActivityModificationService::new(model);
    match service.modify_activity(&activity, &instruction).await {
        Ok(modified) => HttpResponse::Ok().json(modified),
        Err(err) => {
            eprintln!("Failed to modify activity: {}", err);
            HttpResponse::BadGateway().json(json!({
                "error": format!("{}", err)
            }))
        }
    }
}

pub async fn modify_day(
    data: web::Data<AppState>,
    body: web::Json<ModifyDayRequest>,
) -> impl Responder {
    let body = body.into_inner();
    let (activities, instruction) = match (body.activities, body.instruction) {
        (Some(activities), Some(instruction)) if !instruction.trim().is_empty() => {
            (activities, instruction)
        }
        _ => {
            return HttpResponse::BadRequest().json(json!({
                "error": "activities and instruction are required"
            }))
        }
    };
    let day_title = body.day_title.unwrap_or_default();
    let day_number = body.day_number.unwrap_or(1);

    let model = match &data.model {
        Some(model) => model.clone(),
        None => return model_unavailable(),
    };

    let service = ActivityModificationService::new(model);
    match service
        .modify_day(&activities, day_number, &day_title, &instruction)
        .await
    {
        Ok(modified) => HttpResponse::Ok().json(json!({ "activities": modified })),
        Err(err) => {
            eprintln!("Failed to modify day: {}", err);
            HttpResponse::BadGateway().json(json!({
                "error": format!("{}", err)
            }))
        }
    }
}
