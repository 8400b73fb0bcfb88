pub mod cache;
pub mod config;
pub mod console;
pub mod content;
pub mod error;
pub mod ingest;
pub mod lockfile;
pub mod mirror;
pub mod operations;
pub mod persist;
pub mod project;
pub mod registry;
pub mod resolve;
pub mod store;
pub mod tarball;

#[cfg(test)]
pub(crate) mod testing;

pub use config::IppmConfig;
pub use error::{ErrorKind, IppmError};
pub use mirror::Mirror;
pub use project::Project;
pub use resolve::{Resolution, Resolver};

pub type Result<T> = std::result::Result<T, IppmError>;
