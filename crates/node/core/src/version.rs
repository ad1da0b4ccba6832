//! Version information for the Ark node.

/// The version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The user agent advertised to peers through identify.
pub const USER_AGENT: &str = concat!("ark/", env!("CARGO_PKG_VERSION"));
