pub mod account;
pub mod catalog;
pub mod comparison;
pub mod envelope;
pub mod orchestrator;
pub mod strategy;
pub mod transport;

pub use account::AccountService;
pub use catalog::CatalogClient;
pub use comparison::ComparisonEngine;
pub use orchestrator::Orchestrator;
pub use strategy::{StrategyKind, StrategySpec};
pub use transport::{HttpTransport, Method, Transport};
