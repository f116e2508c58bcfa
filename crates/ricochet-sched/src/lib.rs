//! Event calendar for the Ricochet event-driven dynamics engine.
//!
//! Each particle owns a [`ParticleEventList`]: a small sorted window of
//! its earliest candidate events. A [`TournamentTree`] orders the lists
//! by their heads so the globally earliest event is found in O(1) and a
//! re-keyed list is re-seated in O(log N). [`EventCalendar`] ties the two
//! together with per-particle staleness counters and the peculiar-time
//! offset that makes streaming every stored event O(1).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod calendar;
pub mod config;
pub mod error;
pub mod pel;
pub mod tree;

pub use calendar::{EventCalendar, Pushed};
pub use config::CalendarConfig;
pub use error::CalendarError;
pub use pel::ParticleEventList;
pub use tree::TournamentTree;
