pub mod admin;
pub mod application;
pub mod cache;
pub mod collab;
pub mod config;
pub mod draft;
pub mod error;
pub mod io;
pub mod lookup;
pub mod paths;
pub mod platform;
pub mod reconcile;
pub mod registry;
pub mod registry_client;
pub mod store;
pub mod types;
pub mod validate;

pub use error::{OnboardError, Result};
pub use platform::Platform;
