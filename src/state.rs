use std::sync::Arc;

use crate::services::gemini_service::GenerativeModel;
use crate::services::place_validation_service::PlaceLookup;

/// Shared per-worker application state.
///
/// The model is optional: a missing AI key keeps the server up (health,
/// places, images still work) while the generation endpoints report the
/// misconfiguration. Place validation fails open inside its client, so it
/// is always present.
pub struct AppState {
    pub model: Option<Arc<dyn GenerativeModel>>,
    pub places: Arc<dyn PlaceLookup>,
    pub http_client: reqwest::Client,
}
