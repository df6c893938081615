//! Trip status state machine.
//!
//! ```text
//! SEARCHING -> ACCEPTED -> ARRIVING -> STARTED -> COMPLETED
//!     |            |
//!     +------------+--> CANCELLED
//! ```
//!
//! Riders may only cancel; drivers drive the trip forward and never cancel.
//! Role rules are checked first so a wrong actor gets an authorization error
//! regardless of the current status; the table then decides whether the
//! move is legal from where the trip is now.

use std::collections::HashSet;

use crate::{
    error::AppError,
    models::{trip::TripStatus, user::Role},
};

type Edge = (TripStatus, Role, TripStatus);

const EDGES: [Edge; 6] = [
    (TripStatus::Searching, Role::Rider, TripStatus::Cancelled),
    (TripStatus::Accepted, Role::Rider, TripStatus::Cancelled),
    // Reached only through the claim operation.
    (TripStatus::Searching, Role::Driver, TripStatus::Accepted),
    (TripStatus::Accepted, Role::Driver, TripStatus::Arriving),
    (TripStatus::Arriving, Role::Driver, TripStatus::Started),
    (TripStatus::Started, Role::Driver, TripStatus::Completed),
];

/// Which statuses a role may ever ask for.
pub fn authorize(role: Role, requested: TripStatus) -> Result<(), AppError> {
    match (role, requested) {
        (Role::Rider, TripStatus::Cancelled) => Ok(()),
        (
            Role::Rider,
            TripStatus::Searching
            | TripStatus::Accepted
            | TripStatus::Arriving
            | TripStatus::Started
            | TripStatus::Completed,
        ) => Err(AppError::forbidden("Riders can only cancel trips")),
        (Role::Driver, TripStatus::Cancelled) => {
            Err(AppError::forbidden("Rider must cancel the trip"))
        }
        (Role::Driver, TripStatus::Searching) => {
            Err(AppError::forbidden("Drivers cannot reopen a trip"))
        }
        (
            Role::Driver,
            TripStatus::Accepted | TripStatus::Arriving | TripStatus::Started | TripStatus::Completed,
        ) => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct TransitionTable {
    edges: HashSet<Edge>,
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self {
            edges: EDGES.into_iter().collect(),
        }
    }
}

impl TransitionTable {
    pub fn is_allowed(&self, from: TripStatus, role: Role, to: TripStatus) -> bool {
        self.edges.contains(&(from, role, to))
    }

    pub fn check(&self, from: TripStatus, role: Role, to: TripStatus) -> Result<(), AppError> {
        authorize(role, to)?;
        if self.is_allowed(from, role, to) {
            Ok(())
        } else {
            Err(AppError::InvalidTransition { from, to })
        }
    }
}
