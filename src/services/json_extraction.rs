use std::fmt;

use regex::Regex;
use serde_json::Value;

/// How much raw text to keep in error diagnostics.
const SNIPPET_LEN: usize = 200;

#[derive(Debug)]
pub enum ExtractionError {
    NoJsonObject { snippet: String },
    ParseFailed { message: String, snippet: String },
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionError::NoJsonObject { snippet } => {
                write!(f, "No JSON object in model response: {:?}", snippet)
            }
            ExtractionError::ParseFailed { message, snippet } => {
                write!(f, "Failed to parse model JSON ({}): {:?}", message, snippet)
            }
        }
    }
}

impl std::error::Error for ExtractionError {}

fn snippet_of(text: &str) -> String {
    text.chars().take(SNIPPET_LEN).collect()
}

/// Extract the outermost JSON object from a model response.
///
/// Models wrap JSON in code fences and occasionally emit trailing commas
/// or unquoted keys; this strips the fences, slices from the first `{` to
/// the last `}`, repairs both defects, and parses the result.
pub fn extract_json_object(raw: &str) -> Result<Value, ExtractionError> {
    let cleaned = strip_fences(raw);
    let cleaned = cleaned.trim();

    let first_brace = cleaned.find('{');
    let last_brace = cleaned.rfind('}');
    let (start, end) = match (first_brace, last_brace) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(ExtractionError::NoJsonObject {
                snippet: snippet_of(cleaned),
            })
        }
    };

    let body = &cleaned[start..=end];
    parse_with_repair(body)
}

/// Parse the extracted body, repairing only when the plain parse fails.
/// The repair regexes cannot tell a key from text inside a string value,
/// so well-formed output must never pass through them.
fn parse_with_repair(body: &str) -> Result<Value, ExtractionError> {
    if let Ok(value) = serde_json::from_str(body) {
        return Ok(value);
    }

    let repaired = repair_json(body);
    serde_json::from_str(&repaired).map_err(|e| ExtractionError::ParseFailed {
        message: e.to_string(),
        snippet: snippet_of(&repaired),
    })
}

/// Like [`extract_json_object`], but also accepts a response whose outer
/// payload is a bare JSON array (some prompts ask for a list).
pub fn extract_json_payload(raw: &str) -> Result<Value, ExtractionError> {
    let cleaned = strip_fences(raw);
    let cleaned = cleaned.trim();

    // When an array opens before any object, the array is the payload.
    if let (Some(start), Some(end)) = (cleaned.find('['), cleaned.rfind(']')) {
        let object_start = cleaned.find('{').unwrap_or(usize::MAX);
        if start < object_start && start < end {
            return parse_with_repair(&cleaned[start..=end]);
        }
    }

    extract_json_object(cleaned)
}

fn strip_fences(raw: &str) -> String {
    let fence_open = Regex::new(r"(?i)```json\s*").unwrap();
    let fence_close = Regex::new(r"```\s*").unwrap();

    let cleaned = fence_open.replace_all(raw, "");
    fence_close.replace_all(&cleaned, "").into_owned()
}

/// Repair the two defects the model actually produces: trailing commas
/// before a closing bracket, and bare (unquoted) object keys.
fn repair_json(body: &str) -> String {
    let trailing_comma = Regex::new(r",\s*([}\]])").unwrap();
    let unquoted_key = Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"#).unwrap();

    let repaired = trailing_comma.replace_all(body, "$1");
    unquoted_key.replace_all(&repaired, "$1\"$2\":").into_owned()
}

/// Normalize a raw itinerary document in place so it conforms to the
/// typed schema: every activity of every day of every section gets
/// [`normalize_activity`] applied.
pub fn normalize_itinerary(document: &mut Value) {
    let sections = match document
        .get_mut("itinerary_sections")
        .and_then(Value::as_array_mut)
    {
        Some(sections) => sections,
        None => return,
    };

    for section in sections {
        let plans = match section.get_mut("daily_plans").and_then(Value::as_array_mut) {
            Some(plans) => plans,
            None => continue,
        };
        for plan in plans {
            if let Some(plan_obj) = plan.as_object_mut() {
                coerce_number(plan_obj, "day");
            }
            let activities = match plan.get_mut("activities").and_then(Value::as_array_mut) {
                Some(activities) => activities,
                None => continue,
            };
            for activity in activities {
                normalize_activity(activity);
            }
        }
    }
}

/// Normalize one raw activity object in place.
///
/// Rules: numeric-looking strings become numbers (cost clamped to be
/// non-negative), numeric travel times become strings, opening-hours
/// string values become single-element arrays, an opening-hours object
/// that is nothing but a `note` is demoted into the activity notes, and
/// the physical-location invariant is enforced (coordinates and maps link
/// present exactly when `has_physical_location` is true).
pub fn normalize_activity(activity: &mut Value) {
    let obj = match activity.as_object_mut() {
        Some(obj) => obj,
        None => return,
    };

    for field in ["lat", "lng", "rating"] {
        coerce_number(obj, field);
    }

    // estimated_cost_usd: numeric, never negative.
    if let Some(cost) = obj.get("estimated_cost_usd") {
        let parsed = match cost {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let value = parsed.filter(|c| c.is_finite() && *c >= 0.0).unwrap_or(0.0);
        obj.insert(
            "estimated_cost_usd".to_string(),
            serde_json::json!(value),
        );
    }

    // travel_time_from_previous: clients expect a string label.
    if let Some(Value::Number(n)) = obj.get("travel_time_from_previous") {
        let label = n.to_string();
        obj.insert("travel_time_from_previous".to_string(), Value::String(label));
    }

    normalize_opening_hours(obj);
    enforce_physical_location(obj);
}

fn coerce_number(container: &mut serde_json::Map<String, Value>, field: &str) {
    if let Some(Value::String(s)) = container.get(field) {
        if let Ok(parsed) = s.trim().parse::<f64>() {
            let replacement = if parsed.fract() == 0.0 && parsed >= 0.0 && parsed <= u64::MAX as f64
            {
                serde_json::json!(parsed as u64)
            } else {
                serde_json::json!(parsed)
            };
            container.insert(field.to_string(), replacement);
        }
    }
}

fn normalize_opening_hours(obj: &mut serde_json::Map<String, Value>) {
    let hours = match obj.get_mut("opening_hours") {
        Some(Value::Object(hours)) => hours,
        Some(other) => {
            if other.is_null() {
                obj.remove("opening_hours");
            }
            return;
        }
        None => return,
    };

    // A lone "note" is not structured hours; push it into the notes field
    // and drop the structure.
    if hours.len() == 1 {
        if let Some(Value::String(note)) = hours.get("note") {
            let note = note.clone();
            obj.remove("opening_hours");
            match obj.get("notes") {
                Some(Value::String(existing)) if !existing.is_empty() => {
                    let merged = format!("{}. {}", existing, note);
                    obj.insert("notes".to_string(), Value::String(merged));
                }
                _ => {
                    obj.insert("notes".to_string(), Value::String(note));
                }
            }
            return;
        }
    }

    let keys: Vec<String> = hours.keys().cloned().collect();
    for key in keys {
        let normalized = match hours.get(&key) {
            Some(Value::String(s)) => Some(Value::Array(vec![Value::String(s.clone())])),
            Some(Value::Number(n)) => {
                Some(Value::Array(vec![Value::String(n.to_string())]))
            }
            Some(Value::Array(items)) => {
                let strings: Vec<Value> = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Value::String(s.clone()),
                        other => Value::String(other.to_string()),
                    })
                    .collect();
                Some(Value::Array(strings))
            }
            _ => None,
        };
        match normalized {
            Some(value) => {
                hours.insert(key, value);
            }
            None => {
                hours.remove(&key);
            }
        }
    }
}

fn enforce_physical_location(obj: &mut serde_json::Map<String, Value>) {
    let has_location = obj
        .get("has_physical_location")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let has_coordinates = obj.get("lat").map(Value::is_number).unwrap_or(false)
        && obj.get("lng").map(Value::is_number).unwrap_or(false);

    let effective = has_location && has_coordinates;
    obj.insert("has_physical_location".to_string(), Value::Bool(effective));
    if !effective {
        for field in ["lat", "lng", "google_maps_link"] {
            obj.remove(field);
        }
    }
}
