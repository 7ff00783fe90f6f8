use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::editing::{ActivityIdentifier, DayIdentifier};

/// Root itinerary object produced by one generation call and mutated in
/// place by the edit engine afterwards.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ItineraryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation_strategy: Option<String>,
    pub itinerary_sections: Vec<Section>,
}

/// Multi-day grouping sharing a geographic focus and accommodation base.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geographic_focus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation_base: Option<String>,
    pub daily_plans: Vec<DayPlan>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DayPlan {
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing: Option<String>,
    pub activities: Vec<Activity>,
}

/// Smallest schedulable unit: a single stop, meal, or event.
///
/// When `has_physical_location` is true the coordinates and maps link are
/// present; when false they are absent. The generation pipeline enforces
/// this before the document reaches the client.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_flexible: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    pub description: String,
    #[serde(default)]
    pub has_physical_location: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_maps_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<HashMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time_from_previous: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ItineraryDocument {
    /// Look up an activity by positional identifier. Any out-of-range index
    /// yields `None`; callers must check before mutating.
    pub fn activity(&self, id: &ActivityIdentifier) -> Option<&Activity> {
        self.itinerary_sections
            .get(id.section_idx)?
            .daily_plans
            .get(id.day_idx)?
            .activities
            .get(id.activity_idx)
    }

    pub fn activity_mut(&mut self, id: &ActivityIdentifier) -> Option<&mut Activity> {
        self.itinerary_sections
            .get_mut(id.section_idx)?
            .daily_plans
            .get_mut(id.day_idx)?
            .activities
            .get_mut(id.activity_idx)
    }

    pub fn day(&self, id: &DayIdentifier) -> Option<&DayPlan> {
        self.itinerary_sections
            .get(id.section_idx)?
            .daily_plans
            .get(id.day_idx)
    }

    pub fn day_mut(&mut self, id: &DayIdentifier) -> Option<&mut DayPlan> {
        self.itinerary_sections
            .get_mut(id.section_idx)?
            .daily_plans
            .get_mut(id.day_idx)
    }

    pub fn day_activities(&self, section_idx: usize, day_idx: usize) -> Option<&Vec<Activity>> {
        Some(
            &self
                .itinerary_sections
                .get(section_idx)?
                .daily_plans
                .get(day_idx)?
                .activities,
        )
    }

    pub fn day_activities_mut(
        &mut self,
        section_idx: usize,
        day_idx: usize,
    ) -> Option<&mut Vec<Activity>> {
        Some(
            &mut self
                .itinerary_sections
                .get_mut(section_idx)?
                .daily_plans
                .get_mut(day_idx)?
                .activities,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> ItineraryDocument {
        ItineraryDocument {
            trip_summary: Some("Three days in Lisbon".to_string()),
            transport: None,
            accommodation_strategy: None,
            itinerary_sections: vec![Section {
                title: "Lisbon".to_string(),
                day_range: Some("Days 1-3".to_string()),
                geographic_focus: Some("Alfama and Baixa".to_string()),
                accommodation_base: Some("Baixa".to_string()),
                daily_plans: vec![DayPlan {
                    day: 1,
                    date: None,
                    title: "Arrival".to_string(),
                    pacing: None,
                    activities: vec![Activity {
                        time_flexible: Some("10:00".to_string()),
                        activity_type: Some("sightseeing".to_string()),
                        description: "Castelo de São Jorge".to_string(),
                        has_physical_location: true,
                        place_id: Some("abc123".to_string()),
                        place_name: Some("Castelo de São Jorge".to_string()),
                        lat: Some(38.7139),
                        lng: Some(-9.1335),
                        address: None,
                        google_maps_link: Some(
                            "https://www.google.com/maps/place/?q=place_id:abc123".to_string(),
                        ),
                        rating: Some(4.6),
                        opening_hours: None,
                        travel_time_from_previous: None,
                        duration: Some("2h".to_string()),
                        estimated_cost_usd: Some(15.0),
                        notes: None,
                    }],
                }],
            }],
        }
    }

    #[test]
    fn test_activity_lookup_in_range() {
        let doc = sample_document();
        let id = ActivityIdentifier {
            section_idx: 0,
            day_idx: 0,
            activity_idx: 0,
        };
        assert_eq!(
            doc.activity(&id).map(|a| a.description.as_str()),
            Some("Castelo de São Jorge")
        );
    }

    #[test]
    fn test_activity_lookup_out_of_range() {
        let doc = sample_document();
        for id in [
            ActivityIdentifier {
                section_idx: 5,
                day_idx: 0,
                activity_idx: 0,
            },
            ActivityIdentifier {
                section_idx: 0,
                day_idx: 2,
                activity_idx: 0,
            },
            ActivityIdentifier {
                section_idx: 0,
                day_idx: 0,
                activity_idx: 9,
            },
        ] {
            assert!(doc.activity(&id).is_none());
        }
    }

    #[test]
    fn test_clone_is_fully_detached() {
        let mut doc = sample_document();
        let snapshot = doc.itinerary_sections[0].daily_plans[0].activities[0].clone();
        doc.itinerary_sections[0].daily_plans[0].activities[0].description =
            "Something else".to_string();
        assert_eq!(snapshot.description, "Castelo de São Jorge");
    }
}
