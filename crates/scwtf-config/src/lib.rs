//! scwtf provider configuration
//!
//! Resolves credentials and default locality from the provider block, the
//! `SCW_*` environment and the CLI profile file into an immutable [`Meta`].

pub mod args;
pub mod error;
pub mod meta;
pub mod profile;

pub use args::{HostValue, ProviderArgs, UNKNOWN_SENTINEL};
pub use error::{ConfigError, Result};
pub use meta::{Meta, MetaOptions};
pub use profile::{ConfigFile, Profile};
