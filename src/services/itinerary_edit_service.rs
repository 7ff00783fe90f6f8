use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::models::editing::{
    ActivityIdentifier, AiDayModification, AiModification, DayIdentifier, ModificationStatus,
    ModificationTicket, UndoLedger, UndoRecord,
};
use crate::models::itinerary::{Activity, ItineraryDocument};

/// Sort key for activities without a parseable time; sorts last.
const UNSCHEDULED_SORT_KEY: u32 = 9999;

/// Parse a flexible time label into sortable minutes.
///
/// Accepts `H:MM`/`HH:MM` with an optional am/pm suffix (pm adds twelve
/// hours unless already past noon, 12am maps to midnight), then the
/// `HhMM` style ("9h15"), and falls back to [`UNSCHEDULED_SORT_KEY`] for
/// anything else so unscheduled activities sink to the end of the day.
pub fn parse_time_to_minutes(label: Option<&str>) -> u32 {
    let raw = match label {
        Some(raw) if !raw.trim().is_empty() => raw.trim(),
        _ => return UNSCHEDULED_SORT_KEY,
    };

    let clock = Regex::new(r"(\d{1,2}):(\d{2})").unwrap();
    if let Some(caps) = clock.captures(raw) {
        let mut hours: u32 = caps[1].parse().unwrap_or(0);
        let minutes: u32 = caps[2].parse().unwrap_or(0);
        let lower = raw.to_lowercase();
        if lower.contains("pm") && hours < 12 {
            hours += 12;
        }
        if lower.contains("am") && hours == 12 {
            hours = 0;
        }
        return hours * 60 + minutes;
    }

    let hour_style = Regex::new(r"(\d{1,2})h(\d{2})?").unwrap();
    if let Some(caps) = hour_style.captures(raw) {
        let hours: u32 = caps[1].parse().unwrap_or(0);
        let minutes: u32 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        return hours * 60 + minutes;
    }

    UNSCHEDULED_SORT_KEY
}

/// AI-modification collaborator: rewrites one activity or one day's
/// activity list from a free-text instruction, returning the same shape.
#[async_trait]
pub trait ModificationBackend: Send + Sync {
    async fn modify_activity(
        &self,
        activity: &Activity,
        instruction: &str,
    ) -> Result<Activity, Box<dyn std::error::Error + Send + Sync>>;

    async fn modify_day(
        &self,
        activities: &[Activity],
        day_number: u32,
        day_title: &str,
        instruction: &str,
    ) -> Result<Vec<Activity>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Returns a copy of the activity with a single field set to `value`,
/// addressed by its JSON name. `None` when the field name or value shape
/// does not fit the schema.
fn activity_with_field(activity: &Activity, field: &str, value: &Value) -> Option<Activity> {
    let mut tree = serde_json::to_value(activity).ok()?;
    tree.as_object_mut()?.insert(field.to_string(), value.clone());
    serde_json::from_value(tree).ok()
}

/// The itinerary editing state machine for one session.
///
/// Owns the document, the undo ledger, and the two AI-modification
/// request slots (one activity-level, one day-level). All document
/// mutations are synchronous; the only suspension points are the
/// collaborator calls, which run split-phase so a response that arrives
/// after its slot was replaced is provably dropped.
///
/// Identifiers are positional: the caller must not let a structural edit
/// intervene between deriving an identifier and passing it in.
pub struct EditSession {
    id: Uuid,
    document: ItineraryDocument,
    ledger: UndoLedger,
    activity_modification: Option<AiModification>,
    day_modification: Option<AiDayModification>,
    modification_epoch: u64,
}

impl EditSession {
    pub fn new(document: ItineraryDocument) -> Self {
        Self {
            id: Uuid::new_v4(),
            document,
            ledger: UndoLedger::new(),
            activity_modification: None,
            day_modification: None,
            modification_epoch: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn document(&self) -> &ItineraryDocument {
        &self.document
    }

    pub fn can_undo(&self) -> bool {
        self.ledger.can_undo()
    }

    pub fn undo_depth(&self) -> usize {
        self.ledger.len()
    }

    pub fn activity_modification(&self) -> Option<&AiModification> {
        self.activity_modification.as_ref()
    }

    pub fn day_modification(&self) -> Option<&AiDayModification> {
        self.day_modification.as_ref()
    }

    /// Commit one field edit, typically on input blur. Pushes an undo
    /// entry only when the value actually changed; a `time_flexible`
    /// change re-sorts the day, and the undo entry then carries the full
    /// pre-edit day order so undo restores the exact prior arrangement.
    pub fn save_field(
        &mut self,
        id: ActivityIdentifier,
        field: &str,
        new_value: Value,
        previous_value: Value,
    ) {
        let activity = match self.document.activity(&id) {
            Some(activity) => activity,
            None => return,
        };

        let updated = match activity_with_field(activity, field, &new_value) {
            Some(updated) => updated,
            None => return,
        };

        let changed = new_value != previous_value;
        let resorts = field == "time_flexible";

        if changed {
            // An edit that cannot be reverted must not be applied, or undo
            // would silently skip it.
            let reverted = match activity_with_field(activity, field, &previous_value) {
                Some(reverted) => reverted,
                None => return,
            };
            let day_before_sort = if resorts {
                self.document.day_activities(id.section_idx, id.day_idx).cloned()
            } else {
                None
            };
            self.ledger.push(UndoRecord::Edit {
                target: id,
                previous: reverted,
                day_before_sort,
            });
        }

        if let Some(slot) = self.document.activity_mut(&id) {
            *slot = updated;
        }

        if resorts {
            self.sort_day_activities(id.section_idx, id.day_idx);
        }
    }

    /// Stable ascending re-sort of one day by parsed activity time. Not
    /// separately undo-logged; the triggering edit's entry carries the
    /// pre-sort order.
    pub fn sort_day_activities(&mut self, section_idx: usize, day_idx: usize) {
        let activities = match self.document.day_activities_mut(section_idx, day_idx) {
            Some(activities) if activities.len() >= 2 => activities,
            _ => return,
        };
        activities.sort_by_key(|a| parse_time_to_minutes(a.time_flexible.as_deref()));
    }

    pub fn save_day_title(&mut self, id: DayIdentifier, new_title: &str, previous_title: &str) {
        let day = match self.document.day(&id) {
            Some(day) => day,
            None => return,
        };
        debug_assert_eq!(day.title, previous_title);

        if new_title != previous_title {
            self.ledger.push(UndoRecord::DayTitle {
                target: id,
                previous: previous_title.to_string(),
            });
        }
        if let Some(day) = self.document.day_mut(&id) {
            day.title = new_title.to_string();
        }
    }

    /// Swap in a new activity at `id`, keeping a deep clone of the old
    /// one for undo. This is also the path accepted AI previews take.
    pub fn replace_activity(&mut self, id: ActivityIdentifier, new_activity: Activity) {
        let previous = match self.document.activity(&id) {
            Some(activity) => activity.clone(),
            None => return,
        };
        self.ledger.push(UndoRecord::Edit {
            target: id,
            previous,
            day_before_sort: None,
        });
        if let Some(slot) = self.document.activity_mut(&id) {
            *slot = new_activity;
        }
    }

    pub fn delete_activity(&mut self, id: ActivityIdentifier) {
        let previous = match self.document.activity(&id) {
            Some(activity) => activity.clone(),
            None => return,
        };
        self.ledger.push(UndoRecord::Delete {
            target: id,
            previous,
        });
        if let Some(activities) = self.document.day_activities_mut(id.section_idx, id.day_idx) {
            activities.remove(id.activity_idx);
        }
    }

    /// Move an activity across days (drag-and-drop). The destination
    /// index is clamped to the destination length, so a request past the
    /// end inserts at the end.
    pub fn move_activity(
        &mut self,
        from: ActivityIdentifier,
        to_section_idx: usize,
        to_day_idx: usize,
        to_activity_idx: usize,
    ) {
        if self.document.day_activities(to_section_idx, to_day_idx).is_none() {
            return;
        }
        let activity = match self.document.activity(&from) {
            Some(activity) => activity.clone(),
            None => return,
        };

        let target = ActivityIdentifier {
            section_idx: to_section_idx,
            day_idx: to_day_idx,
            activity_idx: to_activity_idx,
        };
        self.ledger.push(UndoRecord::Move {
            target,
            previous: activity.clone(),
            source: from,
        });

        if let Some(source) = self
            .document
            .day_activities_mut(from.section_idx, from.day_idx)
        {
            source.remove(from.activity_idx);
        }
        if let Some(destination) = self.document.day_activities_mut(to_section_idx, to_day_idx) {
            let insert_idx = to_activity_idx.min(destination.len());
            destination.insert(insert_idx, activity);
        }
    }

    /// Replace a whole day's activity list (the accepted-day-preview
    /// path), keeping a deep clone of the current list for undo.
    pub fn replace_day_activities(&mut self, id: DayIdentifier, new_activities: Vec<Activity>) {
        let previous = match self.document.day_activities(id.section_idx, id.day_idx) {
            Some(activities) => activities.clone(),
            None => return,
        };
        self.ledger.push(UndoRecord::ReplaceDay {
            target: id,
            previous,
        });
        if let Some(activities) = self.document.day_activities_mut(id.section_idx, id.day_idx) {
            *activities = new_activities;
        }
    }

    /// Revert the most recent edit. A no-op on an empty ledger. When the
    /// target location no longer exists cleanly the restoration degrades
    /// by skipping the ineffective part instead of failing.
    pub fn undo(&mut self) {
        let entry = match self.ledger.pop() {
            Some(entry) => entry,
            None => return,
        };

        match entry.record {
            UndoRecord::DayTitle { target, previous } => {
                if let Some(day) = self.document.day_mut(&target) {
                    day.title = previous;
                }
            }
            UndoRecord::ReplaceDay { target, previous } => {
                if let Some(activities) = self
                    .document
                    .day_activities_mut(target.section_idx, target.day_idx)
                {
                    *activities = previous;
                }
            }
            UndoRecord::Move {
                target,
                previous,
                source,
            } => {
                // Both ends must still exist before anything is touched.
                if self
                    .document
                    .day_activities(target.section_idx, target.day_idx)
                    .is_none()
                    || self
                        .document
                        .day_activities(source.section_idx, source.day_idx)
                        .is_none()
                {
                    return;
                }
                if let Some(destination) = self
                    .document
                    .day_activities_mut(target.section_idx, target.day_idx)
                {
                    if !destination.is_empty() {
                        // The moved activity may have shifted; clamp.
                        let idx = target.activity_idx.min(destination.len() - 1);
                        destination.remove(idx);
                    }
                }
                if let Some(origin) = self
                    .document
                    .day_activities_mut(source.section_idx, source.day_idx)
                {
                    let idx = source.activity_idx.min(origin.len());
                    origin.insert(idx, previous);
                }
            }
            UndoRecord::Delete { target, previous } => {
                if let Some(activities) = self
                    .document
                    .day_activities_mut(target.section_idx, target.day_idx)
                {
                    let idx = target.activity_idx.min(activities.len());
                    activities.insert(idx, previous);
                }
            }
            UndoRecord::Edit {
                target,
                previous,
                day_before_sort,
            } => {
                if let Some(order) = day_before_sort {
                    if let Some(activities) = self
                        .document
                        .day_activities_mut(target.section_idx, target.day_idx)
                    {
                        *activities = order;
                    }
                } else if let Some(slot) = self.document.activity_mut(&target) {
                    *slot = previous;
                }
            }
        }
    }

    // --- activity-level AI modification ---

    /// Open a fresh activity-modification slot, discarding any unaccepted
    /// predecessor. Bumping the epoch invalidates tickets from the old
    /// slot.
    pub fn start_activity_modification(&mut self, id: ActivityIdentifier) {
        self.modification_epoch += 1;
        self.activity_modification = Some(AiModification {
            target: id,
            prompt: String::new(),
            status: ModificationStatus::Idle,
            preview: None,
            error: None,
            epoch: self.modification_epoch,
        });
    }

    pub fn cancel_activity_modification(&mut self) {
        self.activity_modification = None;
    }

    /// Transition the slot to loading and hand back the payload for the
    /// collaborator call plus a ticket tying the eventual completion to
    /// this slot generation.
    pub fn begin_activity_modification(
        &mut self,
        prompt: &str,
    ) -> Option<(ModificationTicket, Activity)> {
        let slot = self.activity_modification.as_mut()?;
        let target = slot.target;
        slot.prompt = prompt.to_string();
        slot.error = None;

        match self.document.activity(&target) {
            Some(activity) => {
                let payload = activity.clone();
                let slot = self.activity_modification.as_mut()?;
                slot.status = ModificationStatus::Loading;
                Some((ModificationTicket { epoch: slot.epoch }, payload))
            }
            None => {
                let slot = self.activity_modification.as_mut()?;
                slot.status = ModificationStatus::Error;
                slot.error = Some("Activity not found".to_string());
                None
            }
        }
    }

    /// Apply a collaborator response. Stale tickets (the slot was
    /// restarted since the call went out) are dropped silently.
    pub fn complete_activity_modification(
        &mut self,
        ticket: ModificationTicket,
        outcome: Result<Activity, String>,
    ) {
        let slot = match self.activity_modification.as_mut() {
            Some(slot) if slot.epoch == ticket.epoch => slot,
            _ => return,
        };
        match outcome {
            Ok(preview) => {
                slot.preview = Some(preview);
                slot.status = ModificationStatus::Preview;
            }
            Err(message) => {
                slot.error = Some(message);
                slot.status = ModificationStatus::Error;
            }
        }
    }

    /// Convenience wrapper composing begin, the collaborator call, and
    /// complete.
    pub async fn submit_activity_modification(
        &mut self,
        prompt: &str,
        backend: &dyn ModificationBackend,
    ) {
        let (ticket, activity) = match self.begin_activity_modification(prompt) {
            Some(started) => started,
            None => return,
        };
        let outcome = backend
            .modify_activity(&activity, prompt)
            .await
            .map_err(|e| e.to_string());
        self.complete_activity_modification(ticket, outcome);
    }

    /// Apply the previewed activity through the normal replace/undo path
    /// and clear the slot. A no-op without a preview.
    pub fn accept_activity_modification(&mut self) {
        let (target, preview) = match self.activity_modification.as_ref() {
            Some(slot) => match &slot.preview {
                Some(preview) => (slot.target, preview.clone()),
                None => return,
            },
            None => return,
        };
        self.replace_activity(target, preview);
        self.activity_modification = None;
    }

    pub fn discard_activity_modification(&mut self) {
        self.activity_modification = None;
    }

    // --- day-level AI modification ---

    pub fn start_day_modification(&mut self, id: DayIdentifier) {
        self.modification_epoch += 1;
        self.day_modification = Some(AiDayModification {
            target: id,
            prompt: String::new(),
            status: ModificationStatus::Idle,
            preview: None,
            error: None,
            epoch: self.modification_epoch,
        });
    }

    pub fn cancel_day_modification(&mut self) {
        self.day_modification = None;
    }

    /// Day-level counterpart of [`begin_activity_modification`]: the
    /// payload is the day's cloned activity list plus its number and
    /// title for the prompt.
    pub fn begin_day_modification(
        &mut self,
        prompt: &str,
    ) -> Option<(ModificationTicket, Vec<Activity>, u32, String)> {
        let slot = self.day_modification.as_mut()?;
        let target = slot.target;
        slot.prompt = prompt.to_string();
        slot.error = None;

        match self.document.day(&target) {
            Some(day) => {
                let payload = (day.activities.clone(), day.day, day.title.clone());
                let slot = self.day_modification.as_mut()?;
                slot.status = ModificationStatus::Loading;
                Some((
                    ModificationTicket { epoch: slot.epoch },
                    payload.0,
                    payload.1,
                    payload.2,
                ))
            }
            None => {
                let slot = self.day_modification.as_mut()?;
                slot.status = ModificationStatus::Error;
                slot.error = Some("Day not found".to_string());
                None
            }
        }
    }

    pub fn complete_day_modification(
        &mut self,
        ticket: ModificationTicket,
        outcome: Result<Vec<Activity>, String>,
    ) {
        let slot = match self.day_modification.as_mut() {
            Some(slot) if slot.epoch == ticket.epoch => slot,
            _ => return,
        };
        match outcome {
            Ok(preview) => {
                slot.preview = Some(preview);
                slot.status = ModificationStatus::Preview;
            }
            Err(message) => {
                slot.error = Some(message);
                slot.status = ModificationStatus::Error;
            }
        }
    }

    pub async fn submit_day_modification(
        &mut self,
        prompt: &str,
        backend: &dyn ModificationBackend,
    ) {
        let (ticket, activities, day_number, day_title) = match self.begin_day_modification(prompt)
        {
            Some(started) => started,
            None => return,
        };
        let outcome = backend
            .modify_day(&activities, day_number, &day_title, prompt)
            .await
            .map_err(|e| e.to_string());
        self.complete_day_modification(ticket, outcome);
    }

    pub fn accept_day_modification(&mut self) {
        let (target, preview) = match self.day_modification.as_ref() {
            Some(slot) => match &slot.preview {
                Some(preview) => (slot.target, preview.clone()),
                None => return,
            },
            None => return,
        };
        self.replace_day_activities(target, preview);
        self.day_modification = None;
    }

    pub fn discard_day_modification(&mut self) {
        self.day_modification = None;
    }
}
