//! Subcommand implementations.

pub(crate) mod info;
pub(crate) mod init;
pub(crate) mod node;
