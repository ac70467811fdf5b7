//! Ordered collection store.
//!
//! A small transactional object store holding Route and Stop records.
//! It offers exactly what the mutation engine needs:
//!
//! - primary-key lookup of committed records,
//! - an all-or-nothing read-modify-write [`StoreHandle::transaction`],
//! - per-record-set change streams via [`StoreHandle::changes`].
//!
//! Stores are in-memory by default, or snapshotted to a JSON file after
//! every commit when opened with a path.

mod changes;
mod config;
mod error;
mod handle;
mod snapshot;
mod tables;

pub use changes::{AllRoutes, ChangeError, ChangeEvent, Changeset, RecordSet, RouteStops};
pub use config::StoreConfig;
pub use error::{StoreError, TransactionError};
pub use handle::StoreHandle;
pub use tables::{Tables, Transaction};
