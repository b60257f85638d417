//! Discord interaction handlers that are not commands.

/// Autocomplete handlers for kinds, frequencies, categories and rules
pub mod autocomplete;
