use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;

use crate::models::itinerary::ItineraryDocument;
use crate::models::trip::TripParams;
use crate::services::gemini_service::{
    GenerativeError, GenerativeModel, ModelMessage, ModelReply, ToolCallRequest, ToolOutput,
    ToolSpec,
};
use crate::services::json_extraction::{self, ExtractionError};
use crate::services::place_validation_service::{
    validate_batch, PlaceLookup, PlaceQuery, DEFAULT_CHUNK_SIZE, DEFAULT_THROTTLE,
};

pub const MAX_ACTIVITIES_PER_DAY: u32 = 4;

const MAX_TRIP_DAYS: i64 = 30;
const DEFAULT_TRIP_DAYS: u32 = 7;
const VALIDATE_PLACE_TOOL: &str = "validate_place";

#[derive(Debug, Clone)]
pub struct ItineraryGenerationConfig {
    pub max_trip_days: i64,
    pub default_trip_days: u32,
    pub activities_per_day: u32,
    pub validation_chunk_size: usize,
    pub validation_throttle: Duration,
}

impl Default for ItineraryGenerationConfig {
    fn default() -> Self {
        Self {
            max_trip_days: MAX_TRIP_DAYS,
            default_trip_days: DEFAULT_TRIP_DAYS,
            activities_per_day: MAX_ACTIVITIES_PER_DAY,
            validation_chunk_size: DEFAULT_CHUNK_SIZE,
            validation_throttle: DEFAULT_THROTTLE,
        }
    }
}

#[derive(Debug)]
pub enum GenerationError {
    Model(GenerativeError),
    Extraction(ExtractionError),
    Schema(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Model(err) => write!(f, "Itinerary generation failed: {}", err),
            GenerationError::Extraction(err) => {
                write!(f, "Could not extract itinerary JSON: {}", err)
            }
            GenerationError::Schema(msg) => {
                write!(f, "Generated itinerary did not match the schema: {}", msg)
            }
        }
    }
}

impl std::error::Error for GenerationError {}

impl GenerationError {
    /// Distinguishes a missing-credential failure (server misconfiguration)
    /// from a failed generation attempt, for status-code mapping.
    pub fn is_configuration(&self) -> bool {
        matches!(self, GenerationError::Model(GenerativeError::Configuration(_)))
    }
}

/// Compute the trip length in days from the ISO departure/return dates,
/// inclusive of both endpoints. Degenerate or unparseable ranges fall back
/// to the default; anything longer than the cap is clamped.
pub fn trip_duration_days(
    departure_date: Option<&str>,
    return_date: Option<&str>,
    config: &ItineraryGenerationConfig,
) -> u32 {
    let parse = |raw: Option<&str>| {
        raw.and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
    };

    match (parse(departure_date), parse(return_date)) {
        (Some(departure), Some(ret)) => {
            let days = (ret - departure).num_days() + 1;
            if days < 1 {
                config.default_trip_days
            } else {
                days.min(config.max_trip_days) as u32
            }
        }
        _ => config.default_trip_days,
    }
}

fn accommodation_base_count(duration_days: u32) -> u32 {
    match duration_days {
        0..=4 => 1,
        5..=8 => 2,
        _ => 3,
    }
}

fn pacing_guidance(travel_style: Option<&str>) -> &'static str {
    match travel_style.map(str::to_lowercase).as_deref() {
        Some("relaxed") => {
            "Relaxed pace: 2-3 activities per day with generous downtime between them."
        }
        Some("packed") | Some("intense") => {
            "Packed pace: up to 4 activities per day, early starts, efficient routing."
        }
        _ => "Moderate pace: 3 activities per day with breathing room around meals.",
    }
}

/// Builds the generation prompt: trip parameters, the exact JSON shape the
/// response must take, and the planning heuristics.
pub fn build_prompt(params: &TripParams, duration_days: u32) -> String {
    let bases = accommodation_base_count(duration_days);
    let pacing = pacing_guidance(params.travel_style.as_deref());

    let mut prompt = format!(
        "You are an expert travel planner. Create a detailed {}-day itinerary for a trip to {}.\n",
        duration_days, params.destination
    );
    if let Some(departure) = &params.departure {
        prompt.push_str(&format!("The traveler departs from {}.\n", departure));
    }
    if let (Some(from), Some(to)) = (&params.departure_date, &params.return_date) {
        prompt.push_str(&format!("Travel dates: {} to {}.\n", from, to));
    }
    if let Some(budget) = &params.budget {
        prompt.push_str(&format!("Budget level: {}.\n", budget));
    }
    if params.road_trip {
        prompt.push_str("This is a road trip: plan a driving route, not a single-city stay.\n");
    }

    prompt.push_str(&format!(
        "\nPlanning rules:\n\
         - Cluster activities geographically so each day stays in one area; \
           never zig-zag across the destination.\n\
         - Use {} accommodation base(s) for this trip length, and group \
           consecutive days around each base.\n\
         - {}\n\
         - At most {} activities per day, ordered by start time.\n\
         - For every activity at a concrete venue, call the {} tool to \
           confirm it exists before including it. Activities without a fixed \
           venue (e.g. \"stroll the old town\") must set \
           has_physical_location to false.\n\
         - Include realistic travel times between consecutive activities and \
           realistic per-person costs in USD.\n",
        bases, pacing, MAX_ACTIVITIES_PER_DAY, VALIDATE_PLACE_TOOL
    ));

    prompt.push_str(
        "\nRespond with a single JSON object and nothing else, in exactly this shape:\n\
         {\n\
           \"trip_summary\": string,\n\
           \"transport\": string,\n\
           \"accommodation_strategy\": string,\n\
           \"itinerary_sections\": [{\n\
             \"title\": string,\n\
             \"day_range\": string,\n\
             \"geographic_focus\": string,\n\
             \"accommodation_base\": string,\n\
             \"daily_plans\": [{\n\
               \"day\": number,\n\
               \"date\": string,\n\
               \"title\": string,\n\
               \"pacing\": string,\n\
               \"activities\": [{\n\
                 \"time_flexible\": string,\n\
                 \"type\": string,\n\
                 \"description\": string,\n\
                 \"has_physical_location\": boolean,\n\
                 \"place_name\": string,\n\
                 \"travel_time_from_previous\": string,\n\
                 \"duration\": string,\n\
                 \"estimated_cost_usd\": number,\n\
                 \"notes\": string\n\
               }]\n\
             }]\n\
           }]\n\
         }\n",
    );

    prompt
}

fn validate_place_tool() -> ToolSpec {
    ToolSpec {
        name: VALIDATE_PLACE_TOOL.to_string(),
        description: "Verify that a real venue exists. Returns its canonical \
                      name, coordinates, address, rating and maps link, or \
                      found: false when no such place can be confirmed."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "place_name": {
                    "type": "string",
                    "description": "Name of the venue to verify"
                },
                "location": {
                    "type": "string",
                    "description": "City or area the venue is in"
                },
                "type": {
                    "type": "string",
                    "description": "Venue category, e.g. museum or restaurant"
                }
            },
            "required": ["place_name", "location"]
        }),
    }
}

/// End-to-end itinerary generation: prompt, tool loop with place
/// validation, extraction, normalization, typed decode.
pub struct ItineraryGenerator {
    model: Arc<dyn GenerativeModel>,
    places: Arc<dyn PlaceLookup>,
    config: ItineraryGenerationConfig,
}

impl ItineraryGenerator {
    pub fn new(model: Arc<dyn GenerativeModel>, places: Arc<dyn PlaceLookup>) -> Self {
        Self {
            model,
            places,
            config: ItineraryGenerationConfig::default(),
        }
    }

    pub fn with_config(
        model: Arc<dyn GenerativeModel>,
        places: Arc<dyn PlaceLookup>,
        config: ItineraryGenerationConfig,
    ) -> Self {
        Self {
            model,
            places,
            config,
        }
    }

    async fn run_tool_calls(&self, calls: &[ToolCallRequest]) -> Vec<ToolOutput> {
        let queries: Vec<PlaceQuery> = calls
            .iter()
            .map(|call| {
                serde_json::from_value(call.args.clone()).unwrap_or_else(|_| PlaceQuery {
                    place_name: String::new(),
                    location: String::new(),
                    category: String::new(),
                })
            })
            .collect();

        let results = validate_batch(
            self.places.as_ref(),
            &queries,
            self.config.validation_chunk_size,
            self.config.validation_throttle,
        )
        .await;

        calls
            .iter()
            .zip(results)
            .map(|(call, result)| ToolOutput {
                name: call.name.clone(),
                content: match result {
                    Some(place) => serde_json::to_value(&place)
                        .unwrap_or_else(|_| json!({"found": false})),
                    None => json!({"found": false}),
                },
            })
            .collect()
    }

    pub async fn generate(
        &self,
        params: &TripParams,
    ) -> Result<ItineraryDocument, GenerationError> {
        let duration = trip_duration_days(
            params.departure_date.as_deref(),
            params.return_date.as_deref(),
            &self.config,
        );
        let tool_call_budget = (duration * self.config.activities_per_day * 2) as usize;

        println!(
            "[Generation] {} days in {}, tool budget {}",
            duration, params.destination, tool_call_budget
        );

        let tools = vec![validate_place_tool()];
        let mut messages = vec![ModelMessage::User {
            text: build_prompt(params, duration),
        }];

        let mut reply = self
            .model
            .generate(&messages, &tools)
            .await
            .map_err(GenerationError::Model)?;

        let mut total_tool_calls = 0usize;
        while !reply.tool_calls.is_empty() && total_tool_calls < tool_call_budget {
            // The budget caps total calls, so an over-long round is cut
            // short rather than granted in full.
            let granted = (tool_call_budget - total_tool_calls).min(reply.tool_calls.len());
            let calls: Vec<ToolCallRequest> = reply.tool_calls[..granted].to_vec();
            total_tool_calls += calls.len();

            println!(
                "[Generation] Validating {} place(s) ({}/{} tool calls used)",
                calls.len(),
                total_tool_calls,
                tool_call_budget
            );

            let outputs = self.run_tool_calls(&calls).await;

            messages.push(ModelMessage::Assistant {
                reply: ModelReply {
                    text: reply.text.clone(),
                    tool_calls: calls,
                },
            });
            messages.push(ModelMessage::ToolResults { outputs });

            reply = self
                .model
                .generate(&messages, &tools)
                .await
                .map_err(GenerationError::Model)?;
        }

        if !reply.tool_calls.is_empty() {
            eprintln!(
                "[Generation] Tool budget exhausted with {} call(s) still requested; \
                 using the final text response",
                reply.tool_calls.len()
            );
        }

        let mut document =
            json_extraction::extract_json_object(&reply.text).map_err(GenerationError::Extraction)?;
        json_extraction::normalize_itinerary(&mut document);

        serde_json::from_value(document).map_err(|e| GenerationError::Schema(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::services::place_validation_service::PlaceValidationResult;

    fn config() -> ItineraryGenerationConfig {
        ItineraryGenerationConfig {
            validation_throttle: Duration::from_millis(0),
            ..ItineraryGenerationConfig::default()
        }
    }

    fn params(departure: Option<&str>, ret: Option<&str>) -> TripParams {
        TripParams {
            destination: "Portugal".to_string(),
            departure: Some("Berlin".to_string()),
            departure_date: departure.map(str::to_string),
            return_date: ret.map(str::to_string),
            budget: Some("mid-range".to_string()),
            travel_style: Some("relaxed".to_string()),
            road_trip: false,
        }
    }

    #[test]
    fn test_duration_inclusive_of_both_endpoints() {
        let config = config();
        assert_eq!(
            trip_duration_days(Some("2026-09-01"), Some("2026-09-07"), &config),
            7
        );
        assert_eq!(
            trip_duration_days(Some("2026-09-01"), Some("2026-09-01"), &config),
            1
        );
    }

    #[test]
    fn test_duration_clamps_and_defaults() {
        let config = config();
        // Longer than a month clamps to the cap.
        assert_eq!(
            trip_duration_days(Some("2026-01-01"), Some("2026-12-31"), &config),
            30
        );
        // Return before departure is degenerate.
        assert_eq!(
            trip_duration_days(Some("2026-09-07"), Some("2026-09-01"), &config),
            7
        );
        assert_eq!(trip_duration_days(None, Some("2026-09-01"), &config), 7);
        assert_eq!(trip_duration_days(Some("not a date"), Some("2026-09-01"), &config), 7);
    }

    #[test]
    fn test_accommodation_bases_scale_with_duration() {
        assert_eq!(accommodation_base_count(3), 1);
        assert_eq!(accommodation_base_count(4), 1);
        assert_eq!(accommodation_base_count(5), 2);
        assert_eq!(accommodation_base_count(8), 2);
        assert_eq!(accommodation_base_count(9), 3);
        assert_eq!(accommodation_base_count(30), 3);
    }

    #[test]
    fn test_prompt_embeds_parameters_and_heuristics() {
        let prompt = build_prompt(&params(Some("2026-09-01"), Some("2026-09-06")), 6);
        assert!(prompt.contains("6-day itinerary"));
        assert!(prompt.contains("Portugal"));
        assert!(prompt.contains("departs from Berlin"));
        assert!(prompt.contains("2 accommodation base(s)"));
        assert!(prompt.contains("Relaxed pace"));
        assert!(prompt.contains("validate_place"));
        assert!(prompt.contains("\"itinerary_sections\""));
    }

    /// Scripted model: replays a fixed sequence of replies and records how
    /// many times it was called.
    struct ScriptedModel {
        replies: Mutex<Vec<ModelReply>>,
        calls: AtomicUsize,
        seen_tool_results: Mutex<Vec<usize>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<ModelReply>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
                seen_tool_results: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        async fn generate(
            &self,
            messages: &[ModelMessage],
            _tools: &[ToolSpec],
        ) -> Result<ModelReply, GenerativeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ModelMessage::ToolResults { outputs }) = messages.last() {
                self.seen_tool_results.lock().unwrap().push(outputs.len());
            }
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(GenerativeError::Http("script exhausted".to_string()));
            }
            Ok(replies.remove(0))
        }
    }

    struct AlwaysFoundPlaces;

    #[async_trait]
    impl PlaceLookup for AlwaysFoundPlaces {
        async fn validate_place(&self, query: &PlaceQuery) -> Option<PlaceValidationResult> {
            Some(PlaceValidationResult {
                place_id: "abc123".to_string(),
                name: query.place_name.clone(),
                lat: 38.7,
                lng: -9.1,
                address: "Lisbon".to_string(),
                rating: Some(4.6),
                google_maps_link: "https://www.google.com/maps/place/?q=place_id:abc123"
                    .to_string(),
                types: vec!["museum".to_string()],
            })
        }
    }

    fn tool_call(name: &str) -> ToolCallRequest {
        ToolCallRequest {
            name: VALIDATE_PLACE_TOOL.to_string(),
            args: json!({"place_name": name, "location": "Lisbon", "type": "museum"}),
        }
    }

    fn final_document_reply() -> ModelReply {
        ModelReply {
            text: r#"```json
{
  "trip_summary": "A week in Portugal",
  "transport": "Trains and metro",
  "accommodation_strategy": "Two bases",
  "itinerary_sections": [{
    "title": "Lisbon",
    "day_range": "Days 1-3",
    "geographic_focus": "Capital",
    "accommodation_base": "Baixa",
    "daily_plans": [{
      "day": 1,
      "date": "2026-09-01",
      "title": "Old town",
      "pacing": "relaxed",
      "activities": [{
        "time_flexible": "09:00",
        "type": "sightseeing",
        "description": "Visit the castle",
        "has_physical_location": true,
        "place_name": "Castelo de S. Jorge",
        "lat": 38.71,
        "lng": -9.13,
        "google_maps_link": "https://www.google.com/maps/place/?q=place_id:abc123",
        "estimated_cost_usd": "15",
        "notes": "Buy tickets ahead",
      }]
    }]
  }]
}
```"#
            .to_string(),
            tool_calls: vec![],
        }
    }

    #[actix_web::test]
    async fn test_generate_runs_tool_loop_then_parses_document() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelReply {
                text: String::new(),
                tool_calls: vec![tool_call("Castelo de S. Jorge"), tool_call("MAAT")],
            },
            final_document_reply(),
        ]));
        let generator = ItineraryGenerator::with_config(
            model.clone(),
            Arc::new(AlwaysFoundPlaces),
            config(),
        );

        let document = generator
            .generate(&params(Some("2026-09-01"), Some("2026-09-07")))
            .await
            .unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*model.seen_tool_results.lock().unwrap(), vec![2]);
        assert_eq!(document.itinerary_sections.len(), 1);

        let activity = &document.itinerary_sections[0].daily_plans[0].activities[0];
        assert!(activity.has_physical_location);
        // The "15" cost string was repaired into a number.
        assert_eq!(activity.estimated_cost_usd, Some(15.0));
    }

    #[actix_web::test]
    async fn test_generate_stops_at_tool_budget() {
        // 1-day relaxed trip: budget = 1 * 4 * 2 = 8 calls. Each scripted
        // round asks for 8 more, so the loop must stop after one round.
        let greedy_round = ModelReply {
            text: String::new(),
            tool_calls: (0..8).map(|i| tool_call(&format!("place-{}", i))).collect(),
        };
        let model = Arc::new(ScriptedModel::new(vec![
            greedy_round.clone(),
            greedy_round,
            final_document_reply(),
        ]));
        let generator = ItineraryGenerator::with_config(
            model.clone(),
            Arc::new(AlwaysFoundPlaces),
            config(),
        );

        let result = generator
            .generate(&params(Some("2026-09-01"), Some("2026-09-01")))
            .await;

        // Round one exhausts the budget; round two still returns tool calls
        // but the loop exits and extraction runs on its empty text.
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
        assert!(matches!(result, Err(GenerationError::Extraction(_))));
    }

    #[actix_web::test]
    async fn test_generate_reports_unparseable_response() {
        let model = Arc::new(ScriptedModel::new(vec![ModelReply {
            text: "Here is your itinerary, have a great trip!".to_string(),
            tool_calls: vec![],
        }]));
        let generator = ItineraryGenerator::with_config(
            model,
            Arc::new(AlwaysFoundPlaces),
            config(),
        );

        let result = generator.generate(&params(None, None)).await;
        assert!(matches!(result, Err(GenerationError::Extraction(_))));
    }

    #[actix_web::test]
    async fn test_generate_propagates_model_failure() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let generator = ItineraryGenerator::with_config(
            model,
            Arc::new(AlwaysFoundPlaces),
            config(),
        );

        let result = generator.generate(&params(None, None)).await;
        match result {
            Err(GenerationError::Model(GenerativeError::Http(msg))) => {
                assert!(msg.contains("script exhausted"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
