//! Team strength ratings from a time-decayed, season-weighted Dixon-Coles
//! model, fitted on real results augmented with shot-level PSxG
//! resimulations.

pub mod config;
pub mod db;
pub mod error;
pub mod model;

pub use config::{Config, FitConfig};
pub use error::{DataGapError, ModelError, NonConvergenceWarning, UnknownTeamError};
pub use model::TeamModel;
