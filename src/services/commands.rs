use crate::models::{Booking, Placement};

/// A single transform of the store's booking list.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    /// Replace by id in place, or append.
    Upsert(Booking),
    Remove(String),
    /// Move an existing booking; no-op when the id is absent.
    Place { id: String, placement: Placement },
}

impl StoreOp {
    pub fn apply_to(&self, bookings: &mut Vec<Booking>) {
        match self {
            StoreOp::Upsert(booking) => {
                match bookings.iter_mut().find(|b| b.id == booking.id) {
                    Some(existing) => *existing = booking.clone(),
                    None => bookings.push(booking.clone()),
                }
            }
            StoreOp::Remove(id) => bookings.retain(|b| &b.id != id),
            StoreOp::Place { id, placement } => {
                if let Some(existing) = bookings.iter_mut().find(|b| &b.id == id) {
                    *existing = existing.with_placement(placement);
                }
            }
        }
    }
}

/// An optimistic change and the exact transforms that undo it.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub apply: Vec<StoreOp>,
    pub rollback: Vec<StoreOp>,
}

impl Command {
    pub fn insert(booking: Booking) -> Self {
        let id = booking.id.clone();
        Command {
            apply: vec![StoreOp::Upsert(booking)],
            rollback: vec![StoreOp::Remove(id)],
        }
    }

    /// Rollback restores the whole prior record, not just its position.
    pub fn place(before: &Booking, target: Placement) -> Self {
        Command {
            apply: vec![StoreOp::Place {
                id: before.id.clone(),
                placement: target,
            }],
            rollback: vec![StoreOp::Upsert(before.clone())],
        }
    }

    pub fn swap(a: &Booking, b: &Booking) -> Self {
        Command {
            apply: vec![
                StoreOp::Place {
                    id: a.id.clone(),
                    placement: b.placement(),
                },
                StoreOp::Place {
                    id: b.id.clone(),
                    placement: a.placement(),
                },
            ],
            rollback: vec![StoreOp::Upsert(a.clone()), StoreOp::Upsert(b.clone())],
        }
    }

    pub fn remove(before: &Booking) -> Self {
        Command {
            apply: vec![StoreOp::Remove(before.id.clone())],
            rollback: vec![StoreOp::Upsert(before.clone())],
        }
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .apply
            .iter()
            .map(|op| match op {
                StoreOp::Upsert(b) => b.id.clone(),
                StoreOp::Remove(id) | StoreOp::Place { id, .. } => id.clone(),
            })
            .collect();
        ids.dedup();
        ids
    }
}
