// ID generation: nanoid-based identifiers for users and invoices.

/// Generate a unique ID using nanoid (21 characters).
pub fn generate_id() -> String {
    nanoid::nanoid!()
}
