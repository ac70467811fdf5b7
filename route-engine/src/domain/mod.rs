//! Domain types for the route mutation engine.
//!
//! Routes own an ordered sequence of Stops and a selection cursor. The
//! types here carry no storage or concurrency concerns; the pure sequence
//! algorithms live in [`sequence`] so they can be tested in isolation.

mod ids;
mod route;
pub mod sequence;
mod stop;

pub use ids::{InvalidId, RouteId, StopId};
pub use route::{Route, RouteSnapshot};
pub use sequence::{adjacent_to, move_positions, same_members};
pub use stop::{Stop, StopPrimitive};
