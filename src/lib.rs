pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod session;
pub mod tracking;

pub use config::Config;
pub use error::{AppError, AppResult, OrchestratorError, TransportError};
pub use services::{AccountService, CatalogClient, ComparisonEngine, Orchestrator};
pub use session::SessionStore;
