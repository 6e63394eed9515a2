// Helpers for calendar arithmetic and client IP extraction.

pub mod date;
pub mod ip;
