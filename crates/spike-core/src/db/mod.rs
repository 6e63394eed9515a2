pub mod adapter;
pub mod counter_store;
pub mod models;

pub use adapter::{Adapter, AdapterResult, Operator, UniqueIndex, WhereClause};
pub use counter_store::{CounterStore, CounterStoreError, MemoryCounterStore};
pub use models::{DeviceAccessGrant, Invoice, InvoiceStatus, Purchaser, User};
