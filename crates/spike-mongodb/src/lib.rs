// spike-mongodb: MongoDB document store for spike.
//
// Implements the core Adapter trait with the official MongoDB driver.
// Collections are named after the models (`user`, `deviceAccess`,
// `invoice`).

pub mod adapter;
pub mod query;

pub use adapter::MongoAdapter;
