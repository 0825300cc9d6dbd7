//! Domain module - listing records and the persisted report envelope
//!
//! Each module is its own file in the domain/ directory;
//! public exports are defined here for convenience.

pub mod listing;

pub use listing::{Listing, ListingReport, NOT_AVAILABLE};
