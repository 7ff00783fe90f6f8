use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::itinerary::Activity;
use crate::services::gemini_service::{GenerativeError, GenerativeModel, ModelMessage};
use crate::services::itinerary_edit_service::ModificationBackend;
use crate::services::json_extraction::{self, ExtractionError};

#[derive(Debug)]
pub enum ModificationError {
    Model(GenerativeError),
    Extraction(ExtractionError),
    Schema(String),
}

impl fmt::Display for ModificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModificationError::Model(err) => write!(f, "Modification failed: {}", err),
            ModificationError::Extraction(err) => {
                write!(f, "Could not extract modified JSON: {}", err)
            }
            ModificationError::Schema(msg) => {
                write!(f, "Modified result did not match the schema: {}", msg)
            }
        }
    }
}

impl std::error::Error for ModificationError {}

const MODIFICATION_RULES: &str = "\
Rules:\n\
- Keep every field you are not asked to change exactly as it is.\n\
- Keep the same JSON shape and field names as the input.\n\
- estimated_cost_usd must be a non-negative number, never a string.\n\
- If the replacement is at a different venue, clear place_id, lat, lng, \
address, google_maps_link and rating rather than inventing values.\n\
- Respond with JSON only, no commentary.";

/// Rewrites single activities or whole days from a free-text instruction.
/// This is the production [`ModificationBackend`] behind the editing UI.
pub struct ActivityModificationService {
    model: Arc<dyn GenerativeModel>,
}

impl ActivityModificationService {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    async fn complete_text(&self, prompt: String) -> Result<String, ModificationError> {
        let messages = vec![ModelMessage::User { text: prompt }];
        let reply = self
            .model
            .generate(&messages, &[])
            .await
            .map_err(ModificationError::Model)?;
        Ok(reply.text)
    }

    pub async fn modify_activity(
        &self,
        activity: &Activity,
        instruction: &str,
    ) -> Result<Activity, ModificationError> {
        let current = serde_json::to_value(activity)
            .map_err(|e| ModificationError::Schema(e.to_string()))?;
        let prompt = format!(
            "You are editing one activity of a travel itinerary.\n\n\
             Current activity:\n{}\n\n\
             User request: {}\n\n{}",
            current, instruction, MODIFICATION_RULES
        );

        let text = self.complete_text(prompt).await?;
        let mut modified =
            json_extraction::extract_json_object(&text).map_err(ModificationError::Extraction)?;
        json_extraction::normalize_activity(&mut modified);
        serde_json::from_value(modified).map_err(|e| ModificationError::Schema(e.to_string()))
    }

    pub async fn modify_day(
        &self,
        activities: &[Activity],
        day_number: u32,
        day_title: &str,
        instruction: &str,
    ) -> Result<Vec<Activity>, ModificationError> {
        let current = serde_json::to_value(activities)
            .map_err(|e| ModificationError::Schema(e.to_string()))?;
        let prompt = format!(
            "You are editing day {} (\"{}\") of a travel itinerary.\n\n\
             Current activities:\n{}\n\n\
             User request: {}\n\n{}\n\
             - Respond with {{\"activities\": [...]}} containing the full \
             revised list for the day, ordered by start time.",
            day_number, day_title, current, instruction, MODIFICATION_RULES
        );

        let text = self.complete_text(prompt).await?;
        let extracted =
            json_extraction::extract_json_payload(&text).map_err(ModificationError::Extraction)?;

        // Accept either the documented envelope or a bare array.
        let mut list = match extracted {
            Value::Object(mut map) => match map.remove("activities") {
                Some(list @ Value::Array(_)) => list,
                _ => {
                    return Err(ModificationError::Schema(
                        "response object had no activities array".to_string(),
                    ))
                }
            },
            list @ Value::Array(_) => list,
            other => {
                return Err(ModificationError::Schema(format!(
                    "expected an object or array, got {}",
                    other
                )))
            }
        };

        if let Some(items) = list.as_array_mut() {
            for item in items {
                json_extraction::normalize_activity(item);
            }
        }
        serde_json::from_value(list).map_err(|e| ModificationError::Schema(e.to_string()))
    }
}

#[async_trait]
impl ModificationBackend for ActivityModificationService {
    async fn modify_activity(
        &self,
        activity: &Activity,
        instruction: &str,
    ) -> Result<Activity, Box<dyn std::error::Error + Send + Sync>> {
        ActivityModificationService::modify_activity(self, activity, instruction)
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }

    async fn modify_day(
        &self,
        activities: &[Activity],
        day_number: u32,
        day_title: &str,
        instruction: &str,
    ) -> Result<Vec<Activity>, Box<dyn std::error::Error + Send + Sync>> {
        ActivityModificationService::modify_day(self, activities, day_number, day_title, instruction)
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}
