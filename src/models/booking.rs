use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::time::{compute_end_time, duration_minutes, hhmm, minutes_of_day};

/// A booking in canonical shape. Anything that reaches the store has been
/// through the standardizer, which sets `standardized`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    /// Hours, fractional allowed.
    pub duration: f64,
    /// The exclusive resource being scheduled.
    pub instructor_id: Option<String>,
    pub instructor_name: Option<String>,
    pub service_id: Option<String>,
    pub service_name: Option<String>,
    pub status: BookingStatus,
    #[serde(default)]
    pub participants: Vec<Participant>,
    pub notes: Option<String>,
    #[serde(default)]
    pub amount: f64,
    pub final_amount: Option<f64>,
    pub price: Option<f64>,
    pub payment_status: PaymentStatus,
    pub customer_package_id: Option<String>,
    #[serde(rename = "_standardized", default)]
    pub standardized: bool,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }

    pub fn is_group(&self) -> bool {
        self.participants.len() > 1
    }

    pub fn start_minutes(&self) -> u32 {
        minutes_of_day(self.start_time)
    }

    /// May run past 1440 for bookings crossing midnight.
    pub fn end_minutes(&self) -> u32 {
        self.start_minutes()
            .saturating_add(duration_minutes(Some(self.duration)))
    }

    pub fn placement(&self) -> Placement {
        Placement {
            instructor_id: self.instructor_id.clone(),
            date: self.date,
            start_time: self.start_time,
        }
    }

    /// Same booking at a new position. Identity and every non-positional field
    /// are kept; the end time follows the new start.
    pub fn with_placement(&self, placement: &Placement) -> Booking {
        Booking {
            instructor_id: placement.instructor_id.clone(),
            date: placement.date,
            start_time: placement.start_time,
            end_time: compute_end_time(placement.start_time, self.duration),
            ..self.clone()
        }
    }

    pub fn primary_participant(&self) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.is_primary)
            .or_else(|| self.participants.first())
    }
}

/// Where a booking sits on the calendar grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub instructor_id: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub use_package: bool,
    pub customer_package_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked-in",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no-show",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "confirmed" => BookingStatus::Confirmed,
            "checked-in" | "checkedin" => BookingStatus::CheckedIn,
            "completed" | "done" => BookingStatus::Completed,
            "cancelled" | "canceled" => BookingStatus::Cancelled,
            "no-show" | "noshow" => BookingStatus::NoShow,
            _ => BookingStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Partial,
    /// Covered by a customer's prepaid package hours.
    Package,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Package => "package",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "paid" => PaymentStatus::Paid,
            "partial" | "partially_paid" => PaymentStatus::Partial,
            "package" | "package_used" => PaymentStatus::Package,
            "refunded" => PaymentStatus::Refunded,
            _ => PaymentStatus::Unpaid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::booking;

    #[test]
    fn test_status_parse() {
        assert_eq!(BookingStatus::parse("checked_in"), BookingStatus::CheckedIn);
        assert_eq!(BookingStatus::parse("Canceled"), BookingStatus::Cancelled);
        assert_eq!(BookingStatus::parse("no-show"), BookingStatus::NoShow);
        assert_eq!(BookingStatus::parse("whatever"), BookingStatus::Pending);
        assert_eq!(BookingStatus::CheckedIn.as_str(), "checked-in");
    }

    #[test]
    fn test_status_serde_matches_as_str() {
        let json = serde_json::to_value(BookingStatus::NoShow).unwrap();
        assert_eq!(json, serde_json::json!("no-show"));
    }

    #[test]
    fn test_with_placement_keeps_identity() {
        let b = booking("b1", "I1", "09:00", 1.5);
        let moved = b.with_placement(&Placement {
            instructor_id: Some("I2".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        });
        assert_eq!(moved.id, "b1");
        assert_eq!(moved.instructor_id.as_deref(), Some("I2"));
        assert_eq!(moved.end_time, NaiveTime::from_hms_opt(15, 30, 0).unwrap());
        assert_eq!(moved.notes, b.notes);
        assert_eq!(moved.amount, b.amount);
    }

    #[test]
    fn test_end_minutes_past_midnight() {
        let b = booking("late", "I1", "23:30", 1.0);
        assert_eq!(b.start_minutes(), 1410);
        assert_eq!(b.end_minutes(), 1470);
    }

    #[test]
    fn test_booking_serializes_hhmm() {
        let b = booking("b1", "I1", "09:30", 1.0);
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["start_time"], "09:30");
        assert_eq!(json["end_time"], "10:30");
        assert_eq!(json["_standardized"], true);
        let back: Booking = serde_json::from_value(json).unwrap();
        assert_eq!(back, b);
    }
}
