use std::sync::Arc;

use super::commands::Command;
use super::conflict::{check_conflict, Candidate};
use super::coordinator::conflict_error;
use super::events::BookingEvent;
use crate::errors::AppError;
use crate::models::{Booking, SwapRequest};
use crate::state::AppState;

/// Durations closer than this are treated as equal.
pub const DURATION_TOLERANCE_HOURS: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
pub enum SwapOutcome {
    /// Both bookings as they now sit in the store.
    Swapped { a: Booking, b: Booking },
    /// One of the bookings already had a change in flight.
    Skipped,
}

/// Exchanges the positions of two bookings through the backend's atomic swap
/// call, with the store updated optimistically and rolled back on failure.
pub struct SwapOrchestrator {
    state: Arc<AppState>,
}

impl SwapOrchestrator {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn swap(&self, a_id: &str, b_id: &str) -> Result<SwapOutcome, AppError> {
        if a_id == b_id {
            return Err(AppError::Validation("a booking cannot be swapped with itself".to_string()));
        }
        let store = &self.state.store;
        let a = store.get(a_id).ok_or_else(|| AppError::NotFound(a_id.to_string()))?;
        let b = store.get(b_id).ok_or_else(|| AppError::NotFound(b_id.to_string()))?;

        if (a.duration - b.duration).abs() > DURATION_TOLERANCE_HOURS {
            return Err(AppError::Validation(format!(
                "only bookings of equal length can be swapped ({}h and {}h)",
                a.duration, b.duration
            )));
        }

        let Some(_guard) = self.state.locks.try_acquire(&[a_id, b_id]) else {
            tracing::info!(a = a_id, b = b_id, "swap skipped, booking already in flight");
            return Ok(SwapOutcome::Skipped);
        };
        // Responses to earlier moves of either booking are stale from here on.
        self.state.generations.next(a_id);
        self.state.generations.next(b_id);

        let bookings = store.list();
        for (moving, target) in [(&a, b.placement()), (&b, a.placement())] {
            let candidate = Candidate {
                id: Some(moving.id.clone()),
                ..Candidate::at(&target, moving.duration)
            };
            let report = check_conflict(&candidate, &bookings, &[a_id, b_id]);
            if report.has_conflict {
                tracing::info!(
                    booking_id = %moving.id,
                    blocking = ?report.conflicting_ids(),
                    "swap precheck failed"
                );
                return Err(conflict_error(
                    &self.state.directory,
                    target.instructor_id.as_deref(),
                    target.date,
                    target.start_time,
                    &report,
                ));
            }
        }

        let command = Command::swap(&a, &b);
        store.apply(&command.apply);
        let moved_a = a.with_placement(&b.placement());
        let moved_b = b.with_placement(&a.placement());
        self.state.events.publish(BookingEvent::Moved(moved_a.clone()));
        self.state.events.publish(BookingEvent::Moved(moved_b.clone()));

        let request = SwapRequest::exchange(&a, &b);
        match self.state.backend.swap_bookings(&request).await {
            Ok(_) => {
                store.invalidate_snapshot();
                self.state.events.publish(BookingEvent::Swapped {
                    a: moved_a.clone(),
                    b: moved_b.clone(),
                });
                self.state.resync.request();
                tracing::info!(a = a_id, b = b_id, "bookings swapped");
                Ok(SwapOutcome::Swapped { a: moved_a, b: moved_b })
            }
            Err(e) => {
                store.apply(&command.rollback);
                let e = match e {
                    AppError::SwapConflict(mut conflict) => {
                        let directory = &self.state.directory;
                        conflict.instructor_name = directory.name_for(&conflict.instructor_id);

                        AppError::SwapConflict(conflict)
                    }
                    other => other,
                };
                tracing::warn!(a = a_id, b = b_id, error = %e, "swap failed, rolled back");
                self.state.events.publish(BookingEvent::RolledBack {
                    ids: command.ids(),
                    reason: e.to_string(),
                });
                // The backend may have applied part of it.
                self.state.resync.request();
                Err(e)
            }
        }
    }
}
