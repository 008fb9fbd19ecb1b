use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::commands::Command;
use super::conflict::{self, Candidate, ConflictReport};
use super::events::BookingEvent;
use super::resync::resync_once;
use super::retry::{retry_with_backoff, RetryPolicy};
use super::standardizer::standardize;
use crate::errors::AppError;
use crate::models::time::{format_time, is_valid_duration, DEFAULT_DURATION_HOURS};
use crate::models::{
    Booking, BookingPatch, CalendarView, InstructorDirectory, NewBooking, PaymentStatus, Placement,
};
use crate::state::AppState;

/// Entry point for every create, update, move and delete. Calls for
/// different booking ids may run concurrently.
pub struct MutationCoordinator {
    state: Arc<AppState>,
    retry: RetryPolicy,
}

impl MutationCoordinator {
    pub fn new(state: Arc<AppState>) -> Self {
        let retry = RetryPolicy::new(state.config.retry_max, state.config.retry_base_delay);
        Self { state, retry }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Advisory check against the store's current bookings.
    pub fn check_conflict(&self, candidate: &Candidate, exclude_ids: &[&str]) -> ConflictReport {
        conflict::check_conflict(candidate, &self.state.store.list(), exclude_ids)
    }

    pub async fn create(&self, data: NewBooking) -> Result<Booking, AppError> {
        let date = data
            .date
            .ok_or_else(|| AppError::Validation("a booking needs a date".to_string()))?;
        let start = data
            .start_time
            .ok_or_else(|| AppError::Validation("a booking needs a start time".to_string()))?;
        let duration = data
            .duration
            .filter(|d| is_valid_duration(*d))
            .unwrap_or(DEFAULT_DURATION_HOURS);
        if data.use_package_hours && data.customer_package_id.is_none() {
            return Err(AppError::Validation(
                "choose a customer package to use package hours".to_string(),
            ));
        }

        let candidate = Candidate {
            id: None,
            date: Some(date),
            start_time: Some(start),
            duration: Some(duration),
            instructor_id: data.instructor_id.clone(),
        };
        let report = self.check_conflict(&candidate, &[]);
        if report.has_conflict {
            return Err(conflict_error(
                &self.state.directory,
                data.instructor_id.as_deref(),
                date,
                start,
                &report,
            ));
        }

        let (payload, response) = if data.is_group() {
            let payload = data.group_payload(date, start, duration);
            let response = self.state.backend.create_group_booking(&payload).await?;
            (payload, response)
        } else {
            let payload = data.single_payload(date, start, duration);
            let response = self.state.backend.create_booking(&payload).await?;
            (payload, response)
        };

        let now_ms = self.state.clock.now().timestamp_millis();
        let merged = merge_created(&data, payload, &response, now_ms);
        let booking = standardize(&merged)?;

        self.state.store.upsert(booking.clone());
        self.state.events.publish(BookingEvent::Created(booking.clone()));
        self.state.resync.schedule(self.state.config.resync_delay);
        tracing::info!(
            booking_id = %booking.id,
            group = data.is_group(),
            package = data.uses_package(),
            "booking created"
        );
        Ok(booking)
    }

    /// Persist `patch`. Returns the updated booking, or `None` when the
    /// backend accepted the write but neither echoed the record nor had it in
    /// the store; the requested resync brings it in.
    pub async fn update(&self, id: &str, patch: BookingPatch) -> Result<Option<Booking>, AppError> {
        if patch.is_empty() {
            return Err(AppError::Validation("nothing to update".to_string()));
        }
        let existing = self.state.store.get(id);
        let generation = self.state.generations.next(id);

        let result = self.persist(id, &patch).await;

        if !self.state.generations.is_current(id, generation) {
            tracing::debug!(booking_id = id, generation, "ignoring superseded update response");
            return result.map(|response| {
                updated_record(&response).or_else(|| existing.as_ref().map(|b| patch.apply_to(b)))
            });
        }

        let response = result.map_err(|e| {
            tracing::warn!(booking_id = id, error = %e, "update failed");
            e
        })?;
        let booking =
            updated_record(&response).or_else(|| existing.as_ref().map(|b| patch.apply_to(b)));

        match &booking {
            Some(booking) => {
                self.state.store.upsert(booking.clone());
                self.state.events.publish(BookingEvent::Updated(booking.clone()));
            }
            None => tracing::debug!(booking_id = id, "updated booking not held locally"),
        }
        self.state.store.invalidate_snapshot();
        self.state.resync.request();
        tracing::info!(booking_id = id, "booking updated");
        Ok(booking)
    }

    /// Optimistic move: the store changes before the network call and is put
    /// back exactly as it was if the call fails.
    pub async fn move_booking(&self, id: &str, target: Placement) -> Result<Booking, AppError> {
        let before = self
            .state
            .store
            .get(id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        let _guard = self
            .state
            .locks
            .try_acquire(&[id])
            .ok_or_else(|| AppError::Busy(id.to_string()))?;

        let candidate = Candidate {
            id: Some(id.to_string()),
            ..Candidate::at(&target, before.duration)
        };
        let report = self.check_conflict(&candidate, &[]);
        if report.has_conflict {
            return Err(conflict_error(
                &self.state.directory,
                target.instructor_id.as_deref(),
                target.date,
                target.start_time,
                &report,
            ));
        }

        let command = Command::place(&before, target.clone());
        self.state.store.apply(&command.apply);
        let moved = before.with_placement(&target);
        self.state.events.publish(BookingEvent::Moved(moved.clone()));

        let generation = self.state.generations.next(id);
        let result = self.persist(id, &BookingPatch::from_placement(&target)).await;

        if !self.state.generations.is_current(id, generation) {
            tracing::debug!(booking_id = id, generation, "ignoring superseded move response");
            return result.map(|_| moved);
        }

        match result {
            Ok(response) => {
                let booking = updated_record(&response).unwrap_or(moved);
                self.state.store.upsert(booking.clone());
                self.state.store.invalidate_snapshot();
                self.state.resync.request();
                tracing::info!(booking_id = id, "booking moved");
                Ok(booking)
            }
            Err(e) => {
                self.state.store.apply(&command.rollback);
                tracing::warn!(booking_id = id, error = %e, "move failed, rolled back");
                self.state.events.publish(BookingEvent::RolledBack {
                    ids: command.ids(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Tombstone, remove locally, then delete on the backend. A failed delete
    /// is repaired with a full resync rather than a local undo.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let before = self.state.store.get(id);
        self.state.store.tombstone(id);
        if let Some(booking) = &before {
            self.state.store.apply(&Command::remove(booking).apply);
        }
        self.state.events.publish(BookingEvent::Deleted { id: id.to_string() });

        match self.state.backend.delete_booking(id).await {
            Ok(()) => {}
            Err(AppError::NotFound(_)) => {
                tracing::debug!(booking_id = id, "booking already gone on the backend");
            }
            Err(e) => {
                tracing::warn!(booking_id = id, error = %e, "delete failed, resyncing");
                self.state.store.clear_tombstone(id);
                let resynced = match self.state.store.period() {
                    Some(_) => self.resync_now().await.map_err(|resync_err| {
                        tracing::warn!(
                            booking_id = id,
                            error = %resync_err,
                            "resync after failed delete also failed"
                        );
                    }),
                    None => Err(()),
                };
                if resynced.is_err() {
                    if let Some(booking) = &before {
                        self.state.store.apply(&Command::remove(booking).rollback);
                        self.state.events.publish(BookingEvent::RolledBack {
                            ids: vec![id.to_string()],
                            reason: e.to_string(),
                        });
                    }
                }
                return Err(e);
            }
        }

        self.state.store.invalidate_snapshot();
        self.state.resync.request();
        tracing::info!(booking_id = id, "booking deleted");
        Ok(())
    }

    pub async fn resync_now(&self) -> Result<usize, AppError> {
        resync_once(self.state.backend.as_ref(), &self.state.store, &self.state.events).await
    }

    /// Point the store at the period `view` shows around `anchor`. Serves the
    /// cached snapshot when it is still fresh.
    pub async fn load_period(
        &self,
        view: CalendarView,
        anchor: NaiveDate,
    ) -> Result<Vec<Booking>, AppError> {
        let (start, end) = view.visible_period(anchor);
        self.state.store.set_period(start, end);
        if let Some(snapshot) = self.state.store.cached_snapshot() {
            tracing::debug!(view = view.as_str(), %start, %end, "serving cached bookings");
            return Ok(snapshot);
        }
        self.resync_now().await?;
        Ok(self.state.store.list())
    }

    /// Resync when the cached snapshot has expired. Returns whether a fetch ran.
    pub async fn refresh_if_stale(&self) -> Result<bool, AppError> {
        if self.state.store.period().is_none() || !self.state.store.is_refresh_due() {
            return Ok(false);
        }
        self.resync_now().await?;
        Ok(true)
    }

    pub async fn load_instructors(&self) -> Result<usize, AppError> {
        let instructors = self.state.backend.list_instructors().await?;
        self.state.directory.load(instructors);
        Ok(self.state.directory.len())
    }

    async fn persist(&self, id: &str, patch: &BookingPatch) -> Result<Value, AppError> {
        let backend = &self.state.backend;
        let body = patch.to_payload();
        let body = &body;
        // Reused across retries so the backend can drop duplicates.
        let key = Uuid::new_v4().to_string();
        let key = key.as_str();
        retry_with_backoff(&self.retry, "update_booking", move || {
            backend.update_booking(id, body, key)
        })
        .await
    }
}

/// Conflict error naming the instructor and requested time.
pub(crate) fn conflict_error(
    directory: &InstructorDirectory,
    instructor_id: Option<&str>,
    date: NaiveDate,
    start: NaiveTime,
    report: &ConflictReport,
) -> AppError {
    let instructor = instructor_id
        .map(|id| directory.label_for(id))
        .unwrap_or_else(|| "unassigned".to_string());
    AppError::Conflict {
        instructor,
        date: date.format("%Y-%m-%d").to_string(),
        time: format_time(start),
        conflicting_ids: report.conflicting_ids(),
    }
}

/// Backend responses wrap the record under `booking` or `data`, or are the
/// record itself.
fn response_record(response: &Value) -> Option<&Map<String, Value>> {
    ["booking", "data"]
        .iter()
        .find_map(|k| response.get(*k).and_then(Value::as_object))
        .or_else(|| response.as_object())
}

fn updated_record(response: &Value) -> Option<Booking> {
    let record = Value::Object(response_record(response)?.clone());
    standardize(&record).ok()
}

/// Request-shaped record with the response laid over it, so fields the
/// response omits still come from what was submitted.
fn merge_created(data: &NewBooking, payload: Value, response: &Value, now_ms: i64) -> Value {
    let mut merged = match payload {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    merged.insert("id".into(), json!(format!("booking-{now_ms}")));
    if !merged.contains_key("participants") {
        merged.insert("participants".into(), json!(data.participants));
    }
    let package_status = if data.is_group() {
        data.participants.iter().all(|p| p.use_package).then_some(PaymentStatus::Package)
    } else {
        data.uses_package().then_some(PaymentStatus::Package)
    };
    if let Some(status) = package_status {
        merged.insert("payment_status".into(), json!(status.as_str()));
    }

    if let Some(record) = response_record(response) {
        for (key, value) in record {
            if !value.is_null() {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(merged)
}
