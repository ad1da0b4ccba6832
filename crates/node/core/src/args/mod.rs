//! CLI argument structs for node infrastructure configuration.

mod datadir;
mod log;
mod network;

pub use datadir::DataDirArgs;
pub use log::LogArgs;
pub use network::NetworkArgs;
