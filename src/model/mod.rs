pub mod fitter;
pub mod objective;
pub mod optimizer;
pub mod params;
pub mod preprocess;
pub mod probability;
pub mod resimulate;
pub mod team_model;

pub use team_model::TeamModel;
