use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::errors::AppError;
use crate::models::time::{
    compute_end_time, derive_duration, from_decimal_hours, is_valid_duration, parse_time,
};
use crate::models::{Booking, BookingStatus, Participant, PaymentStatus};

/// Bring a backend booking record into canonical shape.
///
/// Field names vary between endpoints (`startTime`, `start_time`, `time`,
/// `start_hour`, ...), dates arrive bare or with a time part, and times as
/// `HH:MM` or decimal hours. Records already marked `_standardized` are
/// decoded as-is, so running this twice gives the same booking.
pub fn standardize(raw: &Value) -> Result<Booking, AppError> {
    if raw.get("_standardized").and_then(Value::as_bool) == Some(true) {
        if let Ok(booking) = serde_json::from_value::<Booking>(raw.clone()) {
            return Ok(booking);
        }
    }

    let id = field(raw, &["id", "_id", "booking_id", "bookingId"])
        .and_then(as_id)
        .ok_or_else(|| AppError::Validation("booking record has no id".to_string()))?;

    let date_value = field(
        raw,
        &["date", "booking_date", "bookingDate", "start_date", "startDate"],
    );
    let date = date_value
        .and_then(Value::as_str)
        .and_then(parse_date)
        .ok_or_else(|| AppError::Validation(format!("booking {id} has no usable date")))?;

    let start_time = field(raw, &["startTime", "start_time", "time"])
        .and_then(as_time)
        .or_else(|| field(raw, &["start_hour", "startHour"]).and_then(as_time))
        .or_else(|| {
            field(raw, &["start_datetime", "startDateTime"])
                .or(date_value)
                .and_then(Value::as_str)
                .and_then(time_from_datetime)
        })
        .ok_or_else(|| AppError::Validation(format!("booking {id} has no usable start time")))?;

    let explicit_end = field(raw, &["endTime", "end_time"]).and_then(as_time);
    let duration = field(raw, &["duration", "duration_hours", "durationHours"])
        .and_then(as_f64)
        .filter(|d| is_valid_duration(*d))
        .unwrap_or_else(|| match explicit_end {
            Some(end) => derive_duration(start_time, end),
            None => crate::models::time::DEFAULT_DURATION_HOURS,
        });
    let end_time = explicit_end.unwrap_or_else(|| compute_end_time(start_time, duration));

    let instructor = raw.get("instructor").filter(|v| v.is_object());
    let instructor_id = field(
        raw,
        &["instructorId", "instructor_id", "instructor_user_id", "resourceId", "resource_id"],
    )
    .and_then(as_id)
    .or_else(|| instructor.and_then(|i| i.get("id")).and_then(as_id));
    let instructor_name = field(raw, &["instructorName", "instructor_name"])
        .and_then(as_string)
        .or_else(|| instructor.and_then(|i| i.get("name")).and_then(as_string));

    let status = field(raw, &["status"])
        .and_then(Value::as_str)
        .map(BookingStatus::parse)
        .unwrap_or(BookingStatus::Pending);

    let payment_status = field(raw, &["paymentStatus", "payment_status"])
        .and_then(Value::as_str)
        .map(PaymentStatus::parse)
        .unwrap_or(PaymentStatus::Unpaid);

    Ok(Booking {
        id,
        date,
        start_time,
        end_time,
        duration,
        instructor_id,
        instructor_name,
        service_id: field(raw, &["serviceId", "service_id"]).and_then(as_id),
        service_name: field(raw, &["serviceName", "service_name"]).and_then(as_string),
        status,
        participants: participants(raw),
        notes: field(raw, &["notes", "note"]).and_then(as_string),
        amount: field(raw, &["amount", "totalAmount", "total_amount"])
            .and_then(as_f64)
            .unwrap_or(0.0),
        final_amount: field(raw, &["finalAmount", "final_amount"]).and_then(as_f64),
        price: field(raw, &["price"]).and_then(as_f64),
        payment_status,
        customer_package_id: field(raw, &["customerPackageId", "customer_package_id"])
            .and_then(as_id),
        standardized: true,
    })
}

/// Drop cancelled bookings; they never show in default lists or take part in
/// conflict checks.
pub fn filter_active(bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.into_iter().filter(Booking::is_active).collect()
}

/// Standardize a backend list, skipping records that cannot be read.
pub fn standardize_all(raw: &[Value]) -> Vec<Booking> {
    raw.iter()
        .filter_map(|record| match standardize(record) {
            Ok(booking) => Some(booking),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable booking record");
                None
            }
        })
        .collect()
}

fn participants(raw: &Value) -> Vec<Participant> {
    if let Some(list) = field(raw, &["participants"]).and_then(Value::as_array) {
        let mut parsed: Vec<Participant> = list
            .iter()
            .map(|p| Participant {
                user_id: field(p, &["userId", "user_id", "student_user_id", "id"]).and_then(as_id),
                user_name: field(p, &["userName", "user_name", "name"]).and_then(as_string),
                user_email: field(p, &["userEmail", "user_email", "email"]).and_then(as_string),
                is_primary: field(p, &["isPrimary", "is_primary"])
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                use_package: field(p, &["usePackage", "use_package"])
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                customer_package_id: field(p, &["customerPackageId", "customer_package_id"])
                    .and_then(as_id),
            })
            .collect();
        if !parsed.is_empty() && !parsed.iter().any(|p| p.is_primary) {
            parsed[0].is_primary = true;
        }
        return parsed;
    }

    // Private bookings often carry the student inline.
    let user_id = field(raw, &["studentId", "student_id", "student_user_id", "userId", "user_id"])
        .and_then(as_id);
    if user_id.is_none() {
        return Vec::new();
    }
    vec![Participant {
        user_id,
        user_name: field(raw, &["studentName", "student_name", "userName", "user_name"])
            .and_then(as_string),
        user_email: field(raw, &["studentEmail", "student_email", "userEmail", "user_email"])
            .and_then(as_string),
        is_primary: true,
        use_package: field(raw, &["usePackage", "use_package"])
            .and_then(Value::as_bool)
            .unwrap_or(false),
        customer_package_id: field(raw, &["customerPackageId", "customer_package_id"])
            .and_then(as_id),
    }]
}

/// First present, non-null value among `keys`.
fn field<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find(|v| !v.is_null())
}

fn as_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_string(v: &Value) -> Option<String> {
    v.as_str().map(str::to_string)
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_time(v: &Value) -> Option<NaiveTime> {
    match v {
        Value::String(s) => parse_time(s),
        Value::Number(n) => n.as_f64().and_then(from_decimal_hours),
        _ => None,
    }
}

/// `2024-06-01`, `2024-06-01T09:00:00`, `2024-06-01 09:00` or RFC 3339.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    s.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

fn time_from_datetime(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local().time());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.time())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{day, hm};
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_snake_case_record() {
        let raw = json!({
            "id": 42,
            "date": "2024-06-01",
            "start_hour": 9.5,
            "duration": "1.5",
            "instructor_user_id": 7,
            "service_id": "svc-1",
            "status": "confirmed",
            "payment_status": "paid",
            "amount": 120,
        });
        let b = standardize(&raw).unwrap();
        assert_eq!(b.id, "42");
        assert_eq!(b.date, day());
        assert_eq!(b.start_time, hm("09:30"));
        assert_eq!(b.end_time, hm("11:00"));
        assert_eq!(b.duration, 1.5);
        assert_eq!(b.instructor_id.as_deref(), Some("7"));
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(b.payment_status, PaymentStatus::Paid);
        assert_eq!(b.amount, 120.0);
        assert!(b.standardized);
    }

    #[test]
    fn test_camel_case_record_with_iso_datetime() {
        let raw = json!({
            "id": "b-1",
            "date": "2024-06-01T00:00:00.000Z",
            "startTime": "14:00",
            "endTime": "15:30",
            "instructor": {"id": "i-9", "name": "Marta"},
        });
        let b = standardize(&raw).unwrap();
        assert_eq!(b.date, day());
        assert_eq!(b.duration, 1.5);
        assert_eq!(b.end_time, hm("15:30"));
        assert_eq!(b.instructor_id.as_deref(), Some("i-9"));
        assert_eq!(b.instructor_name.as_deref(), Some("Marta"));
        assert_eq!(b.status, BookingStatus::Pending);
    }

    #[test]
    fn test_time_taken_from_datetime_when_missing() {
        let raw = json!({"id": "b-2", "date": "2024-06-01T10:15:00"});
        let b = standardize(&raw).unwrap();
        assert_eq!(b.start_time, hm("10:15"));
        assert_eq!(b.duration, 1.0);
        assert_eq!(b.end_time, hm("11:15"));
    }

    #[test]
    fn test_zero_duration_defaults_to_one_hour() {
        let raw = json!({"id": "b-3", "date": "2024-06-01", "time": "08:00", "duration": 0});
        let b = standardize(&raw).unwrap();
        assert_eq!(b.duration, 1.0);
        assert_eq!(b.end_time, hm("09:00"));
    }

    #[test]
    fn test_corrupted_end_time_span() {
        let raw = json!({"id": "b-4", "date": "2024-06-01", "time": "08:00", "end_time": "08:01"});
        let b = standardize(&raw).unwrap();
        assert_eq!(b.duration, 1.0);
    }

    #[test]
    fn test_inline_student_becomes_primary_participant() {
        let raw = json!({
            "id": "b-5", "date": "2024-06-01", "time": "08:00",
            "student_user_id": 11, "student_name": "Ana",
        });
        let b = standardize(&raw).unwrap();
        assert_eq!(b.participants.len(), 1);
        assert!(b.participants[0].is_primary);
        assert_eq!(b.participants[0].user_id.as_deref(), Some("11"));
        assert!(!b.is_group());
    }

    #[test]
    fn test_group_participants() {
        let raw = json!({
            "id": "g-1", "date": "2024-06-01", "time": "10:00",
            "participants": [
                {"userId": "u1", "userName": "Ana", "usePackage": true},
                {"user_id": "u2", "user_name": "Ben"},
            ],
        });
        let b = standardize(&raw).unwrap();
        assert!(b.is_group());
        assert!(b.participants[0].is_primary);
        assert!(b.participants[0].use_package);
        assert_eq!(b.primary_participant().unwrap().user_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_oversized_duration_falls_back_to_default() {
        let raw = json!({"id": "X", "date": "2024-06-01", "time": "09:00", "duration": 1.0e8});
        let b = standardize(&raw).unwrap();
        assert_eq!(b.duration, 1.0);
        assert_eq!(b.end_time, hm("10:00"));
        assert_eq!(b.end_minutes(), 10 * 60);

        let raw = json!({"id": "Y", "date": "2024-06-01", "time": "22:00", "duration": 1e300});
        let kept = standardize_all(&[raw]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].duration, 1.0);
    }

    #[test]
    fn test_missing_id_or_date_rejected() {
        assert!(standardize(&json!({"date": "2024-06-01", "time": "09:00"})).is_err());
        assert!(standardize(&json!({"id": 1, "time": "09:00"})).is_err());
        assert!(standardize(&json!({"id": 1, "date": "2024-06-01"})).is_err());
    }

    #[test]
    fn test_standardized_marker_short_circuits() {
        let first = standardize(&json!({"id": 1, "date": "2024-06-01", "time": "09:00"})).unwrap();
        let mut marked = serde_json::to_value(&first).unwrap();
        // would be read as a different instructor if re-parsed from scratch
        marked["instructor_user_id"] = json!("other");
        assert_eq!(standardize(&marked).unwrap(), first);
    }

    #[test]
    fn test_filter_active() {
        let raw = vec![
            json!({"id": 1, "date": "2024-06-01", "time": "09:00", "status": "cancelled"}),
            json!({"id": 2, "date": "2024-06-01", "time": "10:00", "status": "no_show"}),
            json!({"date": "broken"}),
        ];
        let active = filter_active(standardize_all(&raw));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "2");
    }

    proptest! {
        #[test]
        fn prop_standardize_idempotent(
            id in 1u32..10_000,
            day in 1u32..28,
            start_quarter in 0u32..92,
            duration_quarters in 1u32..16,
            instructor in 1u32..20,
            status in prop_oneof![
                Just("pending"),
                Just("confirmed"),
                Just("cancelled"),
                Just("checked_in"),
            ],

        ) {
            let raw = json!({
                "id": id,
                "date": format!("2024-06-{day:02}"),
                "start_hour": start_quarter as f64 / 4.0,
                "duration": duration_quarters as f64 / 4.0,
                "instructor_user_id": instructor,
                "status": status,
            });
            let once = standardize(&raw).unwrap();
            let twice = standardize(&serde_json::to_value(&once).unwrap()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
