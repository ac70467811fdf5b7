//! Ordered route editing with serialized mutations.
//!
//! A [`RouteEngine`](engine::RouteEngine) accepts fire-and-forget intents
//! ("add this stop", "move these stops", "delete that route") and applies
//! them one at a time, in submission order, as transactions against a
//! [`StoreHandle`](store::StoreHandle). Readers go straight to the store
//! and only ever see committed state.

pub mod domain;
pub mod engine;
pub mod store;
