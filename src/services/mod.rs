pub mod activity_modification_service;
pub mod gemini_service;
pub mod itinerary_edit_service;
pub mod itinerary_generation_service;
pub mod json_extraction;
pub mod place_validation_service;
