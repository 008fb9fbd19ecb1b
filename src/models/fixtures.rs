use chrono::{NaiveDate, NaiveTime};

use super::time::compute_end_time;
use super::{Booking, BookingStatus, PaymentStatus};

pub(crate) fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

pub(crate) fn hm(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

/// Confirmed booking on 2024-06-01.
pub(crate) fn booking(id: &str, instructor: &str, time: &str, duration: f64) -> Booking {
    let start = hm(time);
    Booking {
        id: id.to_string(),
        date: day(),
        start_time: start,
        end_time: compute_end_time(start, duration),
        duration,
        instructor_id: Some(instructor.to_string()),
        instructor_name: None,
        service_id: Some("svc-private".to_string()),
        service_name: None,
        status: BookingStatus::Confirmed,
        participants: vec![],
        notes: Some("bring a wetsuit".to_string()),
        amount: 80.0,
        final_amount: None,
        price: None,
        payment_status: PaymentStatus::Paid,
        customer_package_id: None,
        standardized: true,
    }
}
