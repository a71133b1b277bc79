//! # Trips
//!
//! Everything about the structured records the conversation produces:
//! - **catalog**: the enumerated values a trip may use
//! - **record**: the Trip Record type and validation of tool arguments
//! - **store**: the ordered, append-only list of accepted trips
//! - **hub**: the actor that owns the store and broadcasts changes

pub mod catalog;
pub mod hub;
pub mod record;
pub mod store;

pub use catalog::{ClientDestinations, TripCatalog};
pub use hub::{AppendTrip, CountTrips, GetTrips, Subscribe, TripHub, TripsBroadcast, Unsubscribe};
pub use record::{TripRecord, TripRejection, TripType};
pub use store::TripStore;
