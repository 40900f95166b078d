/// This module provides the CSV row reader and writer used by imports and exports.
pub mod csv;

/// This module provides the storage collaborator contract and its implementations.
pub mod rdbc;
