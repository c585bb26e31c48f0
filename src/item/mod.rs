/// This module provides a logger item writer, used for dry runs.
pub mod logger;

/// This module provides the CSV item reader for legacy exports.
pub mod csv;

/// This module provides the PostgreSQL item writer.
pub mod rdbc;
