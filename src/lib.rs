//! Stroke risk prediction page.
//!
//! Patient attributes are encoded with fixed lookup tables into the feature
//! layout of a pre-trained classifier, either one manually entered record at a
//! time or a whole uploaded CSV.

pub mod config;
pub mod encoding;
pub mod error;
pub mod features;
pub mod flow;
pub mod model;
pub mod records;
pub mod render;
pub mod report;
pub mod server;
pub mod table;

pub use config::AppConfig;
pub use flow::{BatchResult, Event, Interaction, Outcome, Phase};
pub use model::{Classifier, ForestModel, Predictor};
pub use records::{EncodedFeatureRow, PatientForm, PatientRecord, PredictionResult};
