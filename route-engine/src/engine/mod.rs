//! The route mutation engine.
//!
//! Callers submit intents through a [`RouteEngine`]; a single worker task
//! turns each one into a store transaction, strictly in submission order.
//! Intents name records by identifier and are re-resolved when they run,
//! so an intent whose route or stop has since been deleted is dropped
//! rather than failing. Every outcome goes to a [`DiagnosticSink`].

mod apply;
mod config;
mod diagnostics;
mod error;
mod handle;
mod intent;
mod worker;


pub use config::EngineConfig;
pub use diagnostics::{DiagnosticSink, TracingSink};
pub use error::{EngineError, IntentError, Outcome};
pub use handle::RouteEngine;
pub use intent::{Intent, IntentKind};
