pub mod config;
pub mod errors;
pub mod generation;
pub mod menu;
pub mod model;
pub mod persistence;
pub mod reconcile;
pub mod store;

pub mod app_context;
pub use app_context::AppContext;
pub use config::MediagraphConfig;
