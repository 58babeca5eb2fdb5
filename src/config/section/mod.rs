//! Configuration section definitions.

mod build;
mod probe;
mod server;

pub use build::BuildConfig;
pub use probe::ProbeConfig;
pub use server::ServerConfig;
