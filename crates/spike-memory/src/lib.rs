// spike-memory: in-memory document store for spike.
//
// Backs tests and single-process deployments. Data is lost when the last
// handle is dropped.

pub mod adapter;

pub use adapter::MemoryAdapter;
