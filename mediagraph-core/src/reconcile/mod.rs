//! Background refresh of expiring provider URLs.

mod service;

pub use service::{ReconcileService, ReconcileUpdate};
