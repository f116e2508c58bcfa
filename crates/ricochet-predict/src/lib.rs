//! Event predictors for the Ricochet event-driven dynamics engine.
//!
//! The scheduler knows nothing about physics. It asks an
//! [`EventPredictor`] when things will happen and asks it again to make
//! them happen. [`PredictorTable`] implements that capability from four
//! source families ([`Interaction`], [`Local`], [`Global`],
//! [`SystemEvent`]) stored in tables keyed by source id, with shared
//! state passed in through a read-only [`PredictContext`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod outcome;
pub mod predictor;
pub mod properties;
pub mod source;
pub mod table;

pub use context::PredictContext;
pub use error::RegistryError;
pub use outcome::{EventOutcome, ParticleDelta};
pub use predictor::{EventPredictor, Predictions};
pub use properties::{PropertyTable, Species};
pub use source::{Global, Interaction, Local, Prediction, SystemEvent};
pub use table::PredictorTable;
