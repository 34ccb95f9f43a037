//! Trips Module
//!
//! The seam between the realtime layer and the REST layer that owns trips.
//!
//! - **`store`** - `TripStore`: membership checks and chat persistence
//! - **`handlers`** - REST hooks that publish committed mutations and expose
//!   presence

pub mod handlers;
pub mod store;

pub use handlers::{get_trip_presence, get_user_presence, publish_trip_mutation, TripMutation};
pub use store::{InMemoryTripStore, MembershipPolicy, NewChatMessage, PgTripStore, TripStore};
