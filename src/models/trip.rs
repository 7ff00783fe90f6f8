use serde::{Deserialize, Serialize};

/// Parameters submitted by the client when requesting a new itinerary.
///
/// Dates are ISO `YYYY-MM-DD` strings; the generator derives the trip
/// duration from them and falls back to a default when they are missing
/// or nonsensical.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TripParams {
    pub destination: String,
    #[serde(default)]
    pub departure: Option<String>,
    #[serde(default)]
    pub departure_date: Option<String>,
    #[serde(default)]
    pub return_date: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub travel_style: Option<String>,
    #[serde(default)]
    pub road_trip: bool,
}
