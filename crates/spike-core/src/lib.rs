// spike-core: shared types for the spike access-control workspace.
//
// Errors, configuration, persisted models, and the two storage seams the
// policy layer is written against: the document `Adapter` and the
// expiring `CounterStore`.

pub mod db;
pub mod env;
pub mod error;
pub mod options;
pub mod utils;

// Re-exports for convenience
pub use db::adapter::Adapter;
pub use db::counter_store::{CounterStore, CounterStoreError, MemoryCounterStore};
pub use db::models::{DeviceAccessGrant, Invoice, InvoiceStatus, Purchaser, User};
pub use error::{ApiError, ErrorCode, HttpStatus, SpikeError};
pub use options::SpikeOptions;
