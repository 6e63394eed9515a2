// Utility functions: ID generation.

pub mod id;

pub use id::generate_id;
