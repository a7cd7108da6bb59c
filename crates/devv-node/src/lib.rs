//! # Devv Node
//!
//! Process wiring for a Devv validator: configuration, logging setup, the
//! controller that connects the three worker pools to the message bus,
//! and the demo transaction generator.

pub mod config;
pub mod controller;
pub mod generate;
pub mod telemetry;

pub use config::{Mode, NodeConfig};
pub use controller::Controller;
pub use generate::generate_transactions;
