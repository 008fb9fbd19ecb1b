use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::Value;

use crate::models::time::{
    duration_minutes, format_time, from_decimal_hours, minutes_of_day, parse_time,
};
use crate::models::{Booking, Placement};

/// A proposed position for a booking. Every field is optional because
/// candidates come straight from drag-and-drop and form state; an incomplete
/// candidate never conflicts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub id: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    /// Hours; defaults to one.
    pub duration: Option<f64>,
    pub instructor_id: Option<String>,
}

impl Candidate {
    pub fn at(placement: &Placement, duration: f64) -> Self {
        Candidate {
            id: None,
            date: Some(placement.date),
            start_time: Some(placement.start_time),
            duration: Some(duration),
            instructor_id: placement.instructor_id.clone(),
        }
    }

    pub fn for_booking(booking: &Booking) -> Self {
        Candidate {
            id: Some(booking.id.clone()),
            ..Candidate::at(&booking.placement(), booking.duration)
        }
    }

    /// Loose read of a form or backend object. `start_hour` decimal hours are
    /// accepted alongside `HH:MM`.
    pub fn from_value(value: &Value) -> Self {
        let text = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| value.get(*k))
                .find_map(|v| match v {
                    Value::String(s) if !s.is_empty() => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
        };

        let start_time = ["startTime", "start_time", "time"]
            .iter()
            .filter_map(|k| value.get(*k))
            .find_map(|v| v.as_str().and_then(parse_time))
            .or_else(|| {
                ["start_hour", "startHour"]
                    .iter()
                    .filter_map(|k| value.get(*k))
                    .find_map(|v| match v {
                        Value::Number(n) => n.as_f64().and_then(from_decimal_hours),
                        Value::String(s) => parse_time(s),
                        _ => None,
                    })
            });

        Candidate {
            id: text(&["id"]),
            date: text(&["date"]).and_then(|d| {
                d.get(..10)
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            }),
            start_time,
            duration: ["duration"]
                .iter()
                .filter_map(|k| value.get(*k))
                .find_map(|v| match v {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.parse().ok(),
                    _ => None,
                }),
            instructor_id: text(&[
                "instructorId",
                "instructor_id",
                "instructor_user_id",
                "resourceId",
            ]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapType {
    /// Same start time.
    Exact,
    Partial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub booking: Booking,
    pub overlap_type: OverlapType,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub conflicts: Vec<Conflict>,
}

impl ConflictReport {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn conflicting_ids(&self) -> Vec<String> {
        self.conflicts.iter().map(|c| c.booking.id.clone()).collect()
    }

    /// Start of the earliest conflicting booking, for messages.
    pub fn first_start(&self) -> Option<NaiveTime> {
        self.conflicts.iter().map(|c| c.booking.start_time).min()
    }
}

/// Half-open overlap: touching endpoints do not conflict.
pub fn intervals_overlap(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < b_end && a_end > b_start
}

/// Active bookings for the candidate's instructor and date whose interval
/// overlaps the candidate's. The candidate's own id and `exclude_ids` are
/// skipped. Malformed candidates report no conflict.
pub fn check_conflict(
    candidate: &Candidate,
    existing: &[Booking],
    exclude_ids: &[&str],
) -> ConflictReport {
    let (Some(date), Some(start), Some(instructor)) =
        (candidate.date, candidate.start_time, candidate.instructor_id.as_deref())
    else {
        return ConflictReport::none();
    };

    let start_min = minutes_of_day(start);
    let end_min = start_min.saturating_add(duration_minutes(candidate.duration));

    let conflicts: Vec<Conflict> = existing
        .iter()
        .filter(|b| b.is_active())
        .filter(|b| b.date == date && b.instructor_id.as_deref() == Some(instructor))
        .filter(|b| candidate.id.as_deref() != Some(b.id.as_str()))
        .filter(|b| !exclude_ids.contains(&b.id.as_str()))
        .filter(|b| intervals_overlap(start_min, end_min, b.start_minutes(), b.end_minutes()))
        .map(|b| Conflict {
            booking: b.clone(),
            overlap_type: if b.start_time == start {
                OverlapType::Exact
            } else {
                OverlapType::Partial
            },
        })
        .collect();

    ConflictReport {
        has_conflict: !conflicts.is_empty(),
        conflicts,
    }
}

/// Every pair of active bookings that share an instructor and date and
/// overlap. Empty when the calendar is consistent.
pub fn find_overlaps(bookings: &[Booking]) -> Vec<(Booking, Booking)> {
    let mut active: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.is_active() && b.instructor_id.is_some())
        .collect();
    active.sort_by(|a, b| {
        (a.instructor_id.as_deref(), a.date, a.start_minutes())
            .cmp(&(b.instructor_id.as_deref(), b.date, b.start_minutes()))
    });

    let mut pairs = Vec::new();
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            if b.instructor_id != a.instructor_id || b.date != a.date {
                break;
            }
            if b.start_minutes() >= a.end_minutes() {
                continue;
            }
            pairs.push(((*a).clone(), (*b).clone()));
        }
    }
    pairs
}

/// Start times on `date` between `open` and `close`, every `step_minutes`,
/// where a booking of `duration` hours would fit for `instructor_id`.
pub fn free_slots(
    bookings: &[Booking],
    instructor_id: &str,
    date: NaiveDate,
    open: NaiveTime,
    close: NaiveTime,
    step_minutes: u32,
    duration: f64,
) -> Vec<NaiveTime> {
    let step = step_minutes.max(1);
    let length = duration_minutes(Some(duration));
    let close_min = minutes_of_day(close);
    let mut slots = Vec::new();
    let mut at = minutes_of_day(open);

    while at.saturating_add(length) <= close_min {
        if let Some(start) = NaiveTime::from_hms_opt(at / 60, at % 60, 0) {
            let candidate = Candidate {
                id: None,
                date: Some(date),
                start_time: Some(start),
                duration: Some(duration),
                instructor_id: Some(instructor_id.to_string()),
            };
            if !check_conflict(&candidate, bookings, &[]).has_conflict {
                slots.push(start);
            }
        }
        at += step;
    }
    slots
}

/// `"09:00-10:30"`, for logs and messages.
pub fn describe_interval(booking: &Booking) -> String {
    format!("{}-{}", format_time(booking.start_time), format_time(booking.end_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{booking, day, hm};
    use crate::models::BookingStatus;
    use proptest::prelude::*;
    use serde_json::json;

    fn candidate(instructor: &str, time: &str, duration: f64) -> Candidate {
        Candidate {
            id: None,
            date: Some(day()),
            start_time: Some(hm(time)),
            duration: Some(duration),
            instructor_id: Some(instructor.to_string()),
        }
    }

    #[test]
    fn test_touching_end_is_not_a_conflict() {
        let existing = vec![booking("b1", "I1", "09:00", 1.0)];
        let report = check_conflict(&candidate("I1", "10:00", 1.0), &existing, &[]);
        assert!(!report.has_conflict);
        assert!(report.conflicts.is_empty());
    }

    #[test]
    fn test_partial_overlap() {
        let existing = vec![booking("b1", "I1", "09:00", 1.0)];
        let report = check_conflict(&candidate("I1", "09:30", 1.0), &existing, &[]);
        assert!(report.has_conflict);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].overlap_type, OverlapType::Partial);
    }

    #[test]
    fn test_exact_overlap() {
        let existing = vec![booking("b1", "I1", "09:00", 2.0)];
        let report = check_conflict(&candidate("I1", "09:00", 0.5), &existing, &[]);
        assert_eq!(report.conflicts[0].overlap_type, OverlapType::Exact);
    }

    #[test]
    fn test_other_instructor_or_date_ignored() {
        let mut other_day = booking("b2", "I1", "09:00", 1.0);
        other_day.date = day().succ_opt().unwrap();
        let existing = vec![booking("b1", "I2", "09:00", 1.0), other_day];
        assert!(!check_conflict(&candidate("I1", "09:00", 1.0), &existing, &[]).has_conflict);
    }

    #[test]
    fn test_cancelled_ignored() {
        let mut cancelled = booking("b1", "I1", "09:00", 1.0);
        cancelled.status = BookingStatus::Cancelled;
        assert!(!check_conflict(&candidate("I1", "09:00", 1.0), &[cancelled], &[]).has_conflict);
    }

    #[test]
    fn test_excludes_own_id_and_listed_ids() {
        let existing = vec![
            booking("self", "I1", "09:00", 1.0),
            booking("partner", "I1", "09:30", 1.0),
        ];
        let mut c = candidate("I1", "09:15", 1.0);
        c.id = Some("self".to_string());
        let report = check_conflict(&c, &existing, &[]);
        assert_eq!(report.conflicting_ids(), vec!["partner".to_string()]);
        assert!(!check_conflict(&c, &existing, &["partner"]).has_conflict);
    }

    #[test]
    fn test_malformed_candidate_never_conflicts() {
        let existing = vec![booking("b1", "I1", "09:00", 1.0)];
        let mut c = candidate("I1", "09:00", 1.0);
        c.instructor_id = None;
        assert_eq!(check_conflict(&c, &existing, &[]), ConflictReport::none());
        let mut c = candidate("I1", "09:00", 1.0);
        c.date = None;
        assert!(!check_conflict(&c, &existing, &[]).has_conflict);
    }

    #[test]
    fn test_missing_duration_defaults_to_hour() {
        let existing = vec![booking("b1", "I1", "10:00", 1.0)];
        let mut c = candidate("I1", "09:00", 1.0);
        c.duration = None;
        assert!(!check_conflict(&c, &existing, &[]).has_conflict);
        c.start_time = Some(hm("09:01"));
        assert!(check_conflict(&c, &existing, &[]).has_conflict);
    }

    #[test]
    fn test_corrupted_durations_use_the_default_hour() {
        let mut runaway = booking("b1", "I1", "23:00", 1.0);
        runaway.duration = 1e8;
        let existing = vec![runaway, booking("b2", "I1", "09:00", 1.0)];

        let report = check_conflict(&candidate("I1", "23:30", 1e8), &existing, &[]);
        assert_eq!(report.conflicting_ids(), vec!["b1".to_string()]);
        assert!(!check_conflict(&candidate("I1", "10:00", 1.0), &existing, &[]).has_conflict);
        assert!(find_overlaps(&existing).is_empty());
        assert_eq!(free_slots(&existing, "I1", day(), hm("08:00"), hm("12:00"), 60, 1e8).len(), 3);
    }

    #[test]
    fn test_candidate_from_value_decimal_hours() {
        let c = Candidate::from_value(&json!({
            "date": "2024-06-01", "start_hour": 9.5, "duration": 1, "instructor_user_id": 7
        }));
        assert_eq!(c.start_time, Some(hm("09:30")));
        assert_eq!(c.instructor_id.as_deref(), Some("7"));
        assert_eq!(c.duration, Some(1.0));
        assert_eq!(c.date, Some(day()));
    }

    #[test]
    fn test_candidate_from_value_missing_fields() {
        let c = Candidate::from_value(&json!({"time": "09:00"}));
        assert!(!check_conflict(&c, &[booking("b1", "I1", "09:00", 1.0)], &[]).has_conflict);
    }

    #[test]
    fn test_find_overlaps() {
        let bookings = vec![
            booking("a", "I1", "09:00", 1.0),
            booking("b", "I1", "09:30", 1.0),
            booking("c", "I1", "10:15", 1.0),
            booking("d", "I2", "09:00", 1.0),
        ];
        let pairs = find_overlaps(&bookings);
        let ids: Vec<(String, String)> = pairs.into_iter().map(|(a, b)| (a.id, b.id)).collect();
        assert_eq!(
            ids,
            vec![("a".to_string(), "b".to_string()), ("b".to_string(), "c".to_string())]
        );
    }

    #[test]
    fn test_free_slots() {
        let bookings = vec![booking("b1", "I1", "10:00", 1.0)];
        let slots = free_slots(&bookings, "I1", day(), hm("08:00"), hm("12:00"), 60, 1.0);
        assert_eq!(slots, vec![hm("08:00"), hm("09:00"), hm("11:00")]);
    }

    #[test]
    fn test_describe_interval() {
        assert_eq!(describe_interval(&booking("b1", "I1", "09:00", 1.5)), "09:00-10:30");
    }

    proptest! {
        #[test]
        fn prop_detector_agrees_with_interval_math(
            a_start in 0u32..1380, a_len in 1u32..240,
            b_start in 0u32..1380, b_len in 1u32..240,
        ) {
            let to_time = |m: u32| NaiveTime::from_hms_opt(m / 60, m % 60, 0).unwrap();
            let existing = booking("b", "I1", &format_time(to_time(b_start)), b_len as f64 / 60.0);
            let c = Candidate {
                id: None,
                date: Some(day()),
                start_time: Some(to_time(a_start)),
                duration: Some(a_len as f64 / 60.0),
                instructor_id: Some("I1".to_string()),
            };
            let expected = a_start < b_start + b_len && a_start + a_len > b_start;
            prop_assert_eq!(check_conflict(&c, &[existing], &[]).has_conflict, expected);
        }

        #[test]
        fn prop_back_to_back_never_conflicts(start in 0u32..1200, len in 1u32..240) {
            let to_time = |m: u32| NaiveTime::from_hms_opt(m / 60, m % 60, 0).unwrap();
            let existing = booking("b", "I1", &format_time(to_time(start)), len as f64 / 60.0);
            let next = Candidate {
                id: None,
                date: Some(day()),
                start_time: Some(to_time(start + len)),
                duration: Some(1.0),
                instructor_id: Some("I1".to_string()),
            };
            prop_assert!(!check_conflict(&next, &[existing], &[]).has_conflict);
        }

        #[test]
        fn prop_non_overlapping_schedule_has_no_overlaps(
            gaps in proptest::collection::vec((0u32..60, 15u32..120), 1..8),
        ) {
            let mut at = 0u32;
            let mut bookings = Vec::new();
            for (i, (gap, len)) in gaps.into_iter().enumerate() {
                at += gap;
                if at + len >= 1440 {
                    break;
                }
                let start = NaiveTime::from_hms_opt(at / 60, at % 60, 0).unwrap();
                let hours = len as f64 / 60.0;
                bookings.push(booking(&format!("b{i}"), "I1", &format_time(start), hours));

                at += len;
            }
            prop_assert!(find_overlaps(&bookings).is_empty());
        }
    }
}
