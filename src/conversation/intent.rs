//! Intent classification and message parsers for the conversation engine.
//!
//! Classification is deterministic with a fixed precedence: an explicit
//! booking command beats a report-access phrase, which beats smalltalk;
//! anything else is treated as a symptom report.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::booking::parse_schedule;

/// The classified purpose of a user message.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// "book <code> <datetime>". `when` is `None` if the time was missing
    /// or unparseable; the engine asks for clarification in that case.
    BookingCommand {
        test_code: String,
        when: Option<DateTime<Utc>>,
    },
    /// The user wants to open a report; moves the session to AwaitingPin.
    ReportRequest,
    Smalltalk,
    /// Default: hand the text to the symptom matcher.
    SymptomReport,
}

fn booking_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bbook(?:\s+(?:a|an|the))?\s+([A-Za-z][A-Za-z0-9]{1,9})\b(.*)$").unwrap()
    })
}

fn report_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(report|reports|result|results)\b").unwrap())
}

fn smalltalk_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(hi|hello|hey|yo|thanks|thank you|good (morning|afternoon|evening)|bye|goodbye)[\s!.,]*$")
            .unwrap()
    })
}

fn uuid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        )
        .unwrap()
    })
}

fn pin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})\b").unwrap())
}

/// Classify a message received while the session is idle.
pub fn classify(text: &str, now: DateTime<Utc>) -> Intent {
    if let Some(caps) = booking_re().captures(text) {
        let test_code = caps[1].to_uppercase();
        let when = parse_when(caps[2].trim(), now);
        return Intent::BookingCommand { test_code, when };
    }
    if report_re().is_match(text) {
        return Intent::ReportRequest;
    }
    if smalltalk_re().is_match(text) {
        return Intent::Smalltalk;
    }
    Intent::SymptomReport
}

/// Parse the schedule part of a booking command: an absolute timestamp,
/// or `today|tomorrow [at] H[:MM] [am|pm]`. Missing time of day defaults
/// to 09:00.
pub fn parse_when(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(dt) = parse_schedule(text) {
        return Some(dt);
    }

    static RE: OnceLock<Regex> = OnceLock::new();
    let relative = RE.get_or_init(|| {
        Regex::new(r"(?i)\b(today|tomorrow)\b(?:\s+(?:at\s+)?(\d{1,2})(?::(\d{2}))?\s*(am|pm)?)?")
            .unwrap()
    });

    let caps = relative.captures(text)?;
    let day_offset = if caps[1].eq_ignore_ascii_case("tomorrow") {
        1
    } else {
        0
    };

    let mut hour: u32 = caps
        .get(2)
        .map(|m| m.as_str().parse().ok())
        .flatten()
        .unwrap_or(9);
    let minute: u32 = caps
        .get(3)
        .map(|m| m.as_str().parse().ok())
        .flatten()
        .unwrap_or(0);

    if let Some(meridiem) = caps.get(4) {
        let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
        hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }

    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let date = (now + Duration::days(day_offset)).date_naive();
    Some(date.and_time(time).and_utc())
}

/// Extract a booking-id + PIN pair from a message while awaiting PIN entry.
///
/// Accepts the id and PIN in either order. When the id is absent, falls
/// back to `hint` (an id remembered from the report request). The uuid is
/// stripped before searching for the PIN so digits inside an all-numeric
/// uuid segment are never mistaken for it.
pub fn parse_pin_entry(text: &str, hint: Option<&str>) -> Option<(String, String)> {
    let booking_id = uuid_re()
        .find(text)
        .map(|m| m.as_str().to_lowercase())
        .or_else(|| hint.map(|h| h.to_lowercase()));

    let without_id = uuid_re().replace_all(text, " ");
    let pin = pin_re().captures(&without_id).map(|c| c[1].to_string())?;

    Some((booking_id?, pin))
}

/// A booking id mentioned inline in a report request, if any.
pub fn extract_booking_hint(text: &str) -> Option<String> {
    uuid_re().find(text).map(|m| m.as_str().to_lowercase())
}

/// The user wants out of the PIN flow.
pub fn is_cancel(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(cancel|stop|never ?mind|forget it)[\s!.]*$").unwrap())
        .is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    #[test]
    fn booking_command_takes_priority_over_symptom_keywords() {
        // "fever" would otherwise classify as a symptom report.
        let intent = classify("book CBC tomorrow 10am because of my fever", now());
        match intent {
            Intent::BookingCommand { test_code, when } => {
                assert_eq!(test_code, "CBC");
                assert!(when.is_some());
            }
            other => panic!("expected booking command, got {other:?}"),
        }
    }

    #[test]
    fn booking_command_takes_priority_over_report_phrase() {
        let intent = classify("book LIPID tomorrow so I can get my results", now());
        assert!(matches!(intent, Intent::BookingCommand { .. }));
    }

    #[test]
    fn report_phrase_classified_as_report_request() {
        assert_eq!(classify("I want to see my report", now()), Intent::ReportRequest);
        assert_eq!(classify("show me the results please", now()), Intent::ReportRequest);
    }

    #[test]
    fn greetings_are_smalltalk() {
        assert_eq!(classify("hello!", now()), Intent::Smalltalk);
        assert_eq!(classify("thanks", now()), Intent::Smalltalk);
    }

    #[test]
    fn free_text_defaults_to_symptom_report() {
        assert_eq!(
            classify("I have fever and chills", now()),
            Intent::SymptomReport
        );
    }

    #[test]
    fn parse_when_handles_tomorrow_10am() {
        let when = parse_when("tomorrow 10am", now()).unwrap();
        assert_eq!(when.date_naive().to_string(), "2026-08-08");
        assert_eq!(when.hour(), 10);
        assert_eq!(when.minute(), 0);
    }

    #[test]
    fn parse_when_handles_today_with_minutes_and_pm() {
        let when = parse_when("today at 5:30 pm", now()).unwrap();
        assert_eq!(when.date_naive().to_string(), "2026-08-07");
        assert_eq!(when.hour(), 17);
        assert_eq!(when.minute(), 30);
    }

    #[test]
    fn parse_when_handles_twelve_oclock_edge_cases() {
        assert_eq!(parse_when("tomorrow 12am", now()).unwrap().hour(), 0);
        assert_eq!(parse_when("tomorrow 12pm", now()).unwrap().hour(), 12);
    }

    #[test]
    fn parse_when_defaults_to_nine() {
        let when = parse_when("tomorrow", now()).unwrap();
        assert_eq!(when.hour(), 9);
    }

    #[test]
    fn parse_when_accepts_absolute_timestamps() {
        let when = parse_when("2026-08-15T09:30", now()).unwrap();
        assert_eq!(when.date_naive().to_string(), "2026-08-15");
    }

    #[test]
    fn parse_when_rejects_gibberish() {
        assert!(parse_when("whenever", now()).is_none());
        assert!(parse_when("", now()).is_none());
    }

    #[test]
    fn pin_entry_with_id_and_pin() {
        let id = "3f2f3a1e-9c5d-4a1b-8e2f-1a2b3c4d5e6f";
        let (parsed_id, pin) = parse_pin_entry(&format!("{id} 1234"), None).unwrap();
        assert_eq!(parsed_id, id);
        assert_eq!(pin, "1234");
    }

    #[test]
    fn pin_entry_in_reverse_order_and_prose() {
        let id = "3f2f3a1e-9c5d-4a1b-8e2f-1a2b3c4d5e6f";
        let (parsed_id, pin) =
            parse_pin_entry(&format!("my pin is 0042 for booking {id}"), None).unwrap();
        assert_eq!(parsed_id, id);
        assert_eq!(pin, "0042");
    }

    #[test]
    fn pin_entry_uses_hint_when_id_absent() {
        let (id, pin) = parse_pin_entry("1234", Some("abc-hint")).unwrap();
        assert_eq!(id, "abc-hint");
        assert_eq!(pin, "1234");
    }

    #[test]
    fn pin_entry_digits_inside_uuid_not_mistaken_for_pin() {
        // Every segment of this uuid is numeric.
        let id = "12345678-1234-1234-1234-123456789012";
        assert!(parse_pin_entry(&format!("booking {id}"), None).is_none());
    }

    #[test]
    fn pin_entry_without_pin_is_none() {
        assert!(parse_pin_entry("here is my booking", Some("hint")).is_none());
    }

    #[test]
    fn cancel_phrases_recognized() {
        assert!(is_cancel("cancel"));
        assert!(is_cancel("  never mind "));
        assert!(!is_cancel("cancel my subscription to pain"));
    }

    #[test]
    fn hint_extracted_from_report_request() {
        let id = "3f2f3a1e-9c5d-4a1b-8e2f-1a2b3c4d5e6f";
        assert_eq!(
            extract_booking_hint(&format!("show report for {id}")),
            Some(id.to_string())
        );
        assert_eq!(extract_booking_hint("show my report"), None);
    }
}
