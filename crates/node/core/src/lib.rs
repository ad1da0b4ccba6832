//! Core building blocks shared by the `ark` binary: command line arguments,
//! data directory resolution, logging setup and version information.

pub mod args;
pub mod dirs;
pub mod logging;
pub mod version;
