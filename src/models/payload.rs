use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::booking::{Booking, BookingStatus, Participant, Placement};
use super::time::{format_time, from_decimal_hours, to_decimal_hours};

/// What the booking form submits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewBooking {
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub duration: Option<f64>,
    pub instructor_id: Option<String>,
    pub service_id: Option<String>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    pub status: Option<BookingStatus>,
    pub notes: Option<String>,
    pub amount: Option<f64>,
    #[serde(default)]
    pub use_package_hours: bool,
    pub customer_package_id: Option<String>,
}

impl NewBooking {
    pub fn is_group(&self) -> bool {
        self.participants.len() > 1
    }

    pub fn uses_package(&self) -> bool {
        self.use_package_hours && self.customer_package_id.is_some()
    }

    /// Body for `POST /bookings`.
    pub fn single_payload(&self, date: NaiveDate, start: NaiveTime, duration: f64) -> Value {
        let primary = self.participants.first();
        let uses_package = self.uses_package();
        let amount = if uses_package { 0.0 } else { self.amount.unwrap_or(0.0) };
        let package_id = if uses_package { self.customer_package_id.clone() } else { None };

        json!({
            "date": date.format("%Y-%m-%d").to_string(),
            "time": format_time(start),
            "start_hour": to_decimal_hours(start),
            "duration": duration,
            "student_user_id": primary.and_then(|p| p.user_id.clone()),
            "instructor_user_id": self.instructor_id,
            "service_id": self.service_id,
            "status": self.status.unwrap_or(BookingStatus::Pending).as_str(),
            "use_package": uses_package,
            "customer_package_id": package_id,
            "amount": amount,
            "notes": self.notes,
        })
    }

    /// Body for `POST /bookings/group`. Package consumption is decided per
    /// participant.
    pub fn group_payload(&self, date: NaiveDate, start: NaiveTime, duration: f64) -> Value {
        let participants: Vec<Value> = self
            .participants
            .iter()
            .map(|p| {
                let package_id = p.customer_package_id.clone().or_else(|| {
                    if p.use_package {
                        self.customer_package_id.clone()
                    } else {
                        None
                    }
                });

                json!({
                    "user_id": p.user_id,
                    "user_name": p.user_name,
                    "user_email": p.user_email,
                    "is_primary": p.is_primary,
                    "use_package": p.use_package && package_id.is_some(),
                    "customer_package_id": package_id,
                })
            })
            .collect();

        json!({
            "date": date.format("%Y-%m-%d").to_string(),
            "time": format_time(start),
            "start_hour": to_decimal_hours(start),
            "duration": duration,
            "instructor_user_id": self.instructor_id,
            "service_id": self.service_id,
            "status": self.status.unwrap_or(BookingStatus::Pending).as_str(),
            "notes": self.notes,
            "participants": participants,
        })
    }
}

/// Partial update for `PATCH /bookings/{id}`. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingPatch {
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub instructor_id: Option<String>,
    pub service_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub duration: Option<f64>,
    pub amount: Option<f64>,
    pub final_amount: Option<f64>,
    pub price: Option<f64>,
    pub notes: Option<String>,
}

impl BookingPatch {
    pub fn from_placement(placement: &Placement) -> Self {
        BookingPatch {
            date: Some(placement.date),
            start_time: Some(placement.start_time),
            instructor_id: placement.instructor_id.clone(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == BookingPatch::default()
    }

    pub fn to_payload(&self) -> Value {
        let mut body = Map::new();
        if let Some(date) = self.date {
            body.insert("date".into(), json!(date.format("%Y-%m-%d").to_string()));
        }
        if let Some(start) = self.start_time {
            body.insert("start_hour".into(), json!(to_decimal_hours(start)));
            body.insert("time".into(), json!(format_time(start)));
        }
        if let Some(instructor) = &self.instructor_id {
            body.insert("instructor_user_id".into(), json!(instructor));
        }
        if let Some(service) = &self.service_id {
            body.insert("service_id".into(), json!(service));
        }
        if let Some(status) = self.status {
            body.insert("status".into(), json!(status.as_str()));
        }
        if let Some(duration) = self.duration {
            body.insert("duration".into(), json!(duration));
        }
        if let Some(amount) = self.amount {
            body.insert("amount".into(), json!(amount));
        }
        if let Some(final_amount) = self.final_amount {
            body.insert("final_amount".into(), json!(final_amount));
        }
        if let Some(price) = self.price {
            body.insert("price".into(), json!(price));
        }
        if let Some(notes) = &self.notes {
            body.insert("notes".into(), json!(notes));
        }
        Value::Object(body)
    }

    /// Local view of the patch, used when the backend does not echo the
    /// updated record.
    pub fn apply_to(&self, booking: &Booking) -> Booking {
        let mut next = booking.clone();
        if self.date.is_some() || self.start_time.is_some() || self.instructor_id.is_some() {
            next = next.with_placement(&Placement {
                instructor_id: self.instructor_id.clone().or(next.instructor_id.clone()),
                date: self.date.unwrap_or(next.date),
                start_time: self.start_time.unwrap_or(next.start_time),
            });
        }
        if let Some(duration) = self.duration.filter(|d| super::time::is_valid_duration(*d)) {
            next.duration = duration;
            next.end_time = super::time::compute_end_time(next.start_time, duration);
        }
        if let Some(service) = &self.service_id {
            next.service_id = Some(service.clone());
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(amount) = self.amount {
            next.amount = amount;
        }
        if self.final_amount.is_some() {
            next.final_amount = self.final_amount;
        }
        if self.price.is_some() {
            next.price = self.price;
        }
        if let Some(notes) = &self.notes {
            next.notes = Some(notes.clone());
        }
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapSide {
    A,
    B,
}

impl std::fmt::Display for SwapSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwapSide::A => write!(f, "A"),
            SwapSide::B => write!(f, "B"),
        }
    }
}

/// One side of an atomic swap: where `booking_id` should end up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapTarget {
    pub booking_id: String,
    pub instructor_user_id: Option<String>,
    pub start_hour: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub a: SwapTarget,
    pub b: SwapTarget,
    /// Date context the swap was initiated from.
    pub date: NaiveDate,
}

impl SwapRequest {
    /// `a` takes `b`'s position and vice versa.
    pub fn exchange(a: &Booking, b: &Booking) -> Self {
        SwapRequest {
            a: SwapTarget {
                booking_id: a.id.clone(),
                instructor_user_id: b.instructor_id.clone(),
                start_hour: to_decimal_hours(b.start_time),
                date: b.date,
            },
            b: SwapTarget {
                booking_id: b.id.clone(),
                instructor_user_id: a.instructor_id.clone(),
                start_hour: to_decimal_hours(a.start_time),
                date: a.date,
            },
            date: a.date,
        }
    }
}

/// Typed 409 from the swap endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapConflict {
    pub side: SwapSide,
    pub instructor_id: String,
    pub instructor_name: Option<String>,
    pub start_time: NaiveTime,
}

impl SwapConflict {
    /// Decode `{side, target: {instructor_user_id, start_hour}}`. Ids may be
    /// numbers or strings.
    pub fn from_value(body: &Value) -> Option<Self> {
        let side = match body.get("side")?.as_str()? {
            "A" | "a" => SwapSide::A,
            "B" | "b" => SwapSide::B,
            _ => return None,
        };
        let target = body.get("target")?;
        let instructor_id = match target.get("instructor_user_id")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let start_hour = match target.get("start_hour")? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.parse().ok()?,
            _ => return None,
        };
        Some(SwapConflict {
            side,
            instructor_id,
            instructor_name: None,
            start_time: from_decimal_hours(start_hour)?,
        })
    }
}

impl std::fmt::Display for SwapConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let who = match &self.instructor_name {
            Some(name) => format!("{name} ({})", self.instructor_id),
            None => self.instructor_id.clone(),
        };
        write!(
            f,
            "swap rejected on side {}: instructor {who} is already booked at {}",
            self.side,
            format_time(self.start_time)
        )
    }
}
