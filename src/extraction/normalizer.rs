use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::common::constants::{ALLOWED_CATEGORY_IDS, DEFAULT_CATEGORY_ID};
use crate::common::dates::{is_clock_time, is_iso_date, parse_iso_date};
use crate::common::types::{DailyTimeSlot, Event, Location, SocialMedia};

/// Maps a free-form category id onto the allow-list, folding case and umlauts.
pub fn canonical_category_id(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return DEFAULT_CATEGORY_ID.to_string();
    };
    let folded = raw
        .trim()
        .to_lowercase()
        .replace('ä', "ae")
        .replace('ö', "oe")
        .replace('ü', "ue")
        .replace('ß', "ss");
    if ALLOWED_CATEGORY_IDS.contains(&folded.as_str()) {
        folded
    } else {
        DEFAULT_CATEGORY_ID.to_string()
    }
}

/// Completes partial LLM output into canonical events.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventNormalizer;

impl EventNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalizes every item; items without a title or a valid time slot are dropped.
    pub fn normalize_events(&self, raw_events: &[Value]) -> Vec<Event> {
        let events: Vec<Event> = raw_events
            .iter()
            .filter_map(|raw| self.normalize_event(raw))
            .collect();
        if events.len() < raw_events.len() {
            warn!(
                dropped = raw_events.len() - events.len(),
                "Dropped LLM events without title or valid time slot"
            );
        }
        events
    }

    pub fn normalize_event(&self, raw: &Value) -> Option<Event> {
        let object = raw.as_object()?;
        let title = string_field(object, "title")?;
        let slots = time_slots(object.get("dailyTimeSlots"));
        if slots.is_empty() {
            debug!(title = %title, "LLM event has no valid time slot");
            return None;
        }

        let mut event = Event::draft(title, location(object.get("location")), slots);
        event.description = string_field(object, "description").unwrap_or_default();
        event.category_id = canonical_category_id(object.get("categoryId").and_then(Value::as_str));
        event.price = object.get("price").and_then(number);
        event.price_string = string_field(object, "priceString");
        event.website = string_field(object, "website");
        event.contact_email = string_field(object, "contactEmail");
        event.contact_phone = string_field(object, "contactPhone");
        event.social_media = object.get("socialMedia").and_then(social_media);
        event.tickets_needed = object.get("ticketsNeeded").and_then(Value::as_bool);
        Some(event)
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

fn location(value: Option<&Value>) -> Location {
    match value {
        Some(Value::String(address)) => Location::unresolved(address.trim()),
        Some(Value::Object(object)) => {
            let coordinate = |keys: [&str; 2]| {
                keys.iter()
                    .find_map(|key| object.get(*key).and_then(number))
                    .unwrap_or(0.0)
            };
            Location {
                address: string_field(object, "address").unwrap_or_default(),
                latitude: coordinate(["lat", "latitude"]),
                longitude: coordinate(["lng", "longitude"]),
            }
        }
        _ => Location::default(),
    }
}

fn time_slots(value: Option<&Value>) -> Vec<DailyTimeSlot> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let object = item.as_object()?;
            let date_text = object.get("date")?.as_str()?.trim();
            if !is_iso_date(date_text) {
                return None;
            }
            let date = parse_iso_date(date_text)?;
            let clock = |key: &str| {
                object
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|t| is_clock_time(t))
                    .map(str::to_string)
            };
            Some(DailyTimeSlot::new(date, clock("from"), clock("to")))
        })
        .collect()
}

fn social_media(value: &Value) -> Option<SocialMedia> {
    let object = value.as_object()?;
    let social = SocialMedia {
        instagram: string_field(object, "instagram"),
        facebook: string_field(object, "facebook"),
        tiktok: string_field(object, "tiktok"),
    };
    (!social.is_empty()).then_some(social)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_category_allow_list() {
        assert_eq!(canonical_category_id(Some("Konzert")), "konzert");
        assert_eq!(canonical_category_id(Some(" Führung ")), "fuehrung");
        assert_eq!(canonical_category_id(Some("opera")), "default");
        assert_eq!(canonical_category_id(None), "default");
    }

    #[test]
    fn test_normalizes_partial_event() {
        let raw = json!({
            "title": "  Jazz im Hof ",
            "location": {"address": "Kulturhof", "lat": 49.45, "lng": 11.07},
            "dailyTimeSlots": [
                {"date": "2026-10-25", "from": "20:00", "to": "23 Uhr"},
                {"date": "25.10.2026", "from": "20:00"},
                {"date": "2026-10-26"}
            ],
            "categoryId": "konzert",
            "price": "12,50",
            "priceString": "12,50 €",
            "ticketsNeeded": true,
            "isPromoted": true,
            "titleImageUrl": "https://img.test/a.jpg",
            "socialMedia": {"instagram": "@kulturhof", "facebook": ""}
        });
        let event = EventNormalizer::new().normalize_event(&raw).unwrap();

        assert_eq!(event.title, "Jazz im Hof");
        assert_eq!(event.location.latitude, 49.45);
        assert_eq!(event.daily_time_slots.len(), 2);
        let first = &event.daily_time_slots[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2026, 10, 25).unwrap());
        assert_eq!(first.from.as_deref(), Some("20:00"));
        assert_eq!(first.to, None);
        assert_eq!(event.price, Some(12.5));
        assert_eq!(event.tickets_needed, Some(true));
        assert_eq!(event.is_promoted, None);
        assert_eq!(event.social_media.unwrap().instagram.as_deref(), Some("@kulturhof"));
        assert!(!event.id.is_empty());
    }

    #[test]
    fn test_missing_location_defaults_and_invalid_items_drop() {
        let raw = vec![
            json!({"title": "Flohmarkt", "dailyTimeSlots": [{"date": "2026-11-01"}], "categoryId": "unbekannt"}),
            json!({"title": "", "dailyTimeSlots": [{"date": "2026-11-01"}]}),
            json!({"title": "Ohne Datum", "dailyTimeSlots": []}),
            json!("not an object"),
        ];
        let events = EventNormalizer::new().normalize_events(&raw);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].location, Location::default());
        assert_eq!(events[0].category_id, "default");
    }
}
