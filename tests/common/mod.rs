use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use wayfarer_api::services::gemini_service::{
    GenerativeError, GenerativeModel, ModelMessage, ModelReply, ToolSpec,
};
use wayfarer_api::services::place_validation_service::{
    PlaceLookup, PlaceQuery, PlaceValidationResult,
};
use wayfarer_api::state::AppState;

/// Scripted generative model: replays a fixed reply sequence and counts
/// calls.
pub struct MockModel {
    replies: Mutex<Vec<ModelReply>>,
    pub calls: AtomicUsize,
}

impl MockModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn text_reply(text: &str) -> ModelReply {
        ModelReply {
            text: text.to_string(),
            tool_calls: vec![],
        }
    }
}

#[async_trait]
impl GenerativeModel for MockModel {
    async fn generate(
        &self,
        _messages: &[ModelMessage],
        _tools: &[ToolSpec],
    ) -> Result<ModelReply, GenerativeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(GenerativeError::Http("mock script exhausted".to_string()));
        }
        Ok(replies.remove(0))
    }
}

/// Place lookup that confirms every query with fixed coordinates.
pub struct MockPlaces;

#[async_trait]
impl PlaceLookup for MockPlaces {
    async fn validate_place(&self, query: &PlaceQuery) -> Option<PlaceValidationResult> {
        Some(PlaceValidationResult {
            place_id: format!("mock-{}", query.place_name),
            name: query.place_name.clone(),
            lat: 41.38,
            lng: 2.17,
            address: format!("{}, {}", query.place_name, query.location),
            rating: Some(4.4),
            google_maps_link: format!(
                "https://www.google.com/maps/place/?q=place_id:mock-{}",
                query.place_name
            ),
            types: vec![query.category.clone()],
        })
    }
}

pub fn app_state(model: Option<Arc<dyn GenerativeModel>>) -> AppState {
    AppState {
        model,
        places: Arc::new(MockPlaces),
        http_client: reqwest::Client::new(),
    }
}
