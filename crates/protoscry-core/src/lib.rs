//! # protoscry-core
//!
//! A library for recovering Protocol Buffer schemas from compiled .NET
//! assemblies.
//!
//! Code generators for protobuf leave the schema behind in the compiled
//! module, in one of two forms:
//! - Google.Protobuf generated classes embed a reflection descriptor per
//!   message
//! - protobuf-net contract types carry the schema in member attributes,
//!   with oneof membership only visible in generated method bodies
//!
//! This crate reads the module's metadata (never executing it) and
//! reconstructs a `.proto` file from either form.
//!
//! ## Architecture
//!
//! - [`metadata`]: Module metadata model and the [`MetadataProvider`] trait
//! - [`descriptor`]: Reflection descriptor view used by the descriptor walk
//! - [`typemap`]: Runtime type to proto3 type mapping
//! - [`extract`]: The two extraction strategies and the [`Extractor`] driver
//! - [`schema`]: Recovered schema model
//! - [`proto`]: Proto3 text emission
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use protoscry_core::{Extractor, Module, Strategy};
//!
//! // Load a metadata dump of the compiled module
//! let module = Module::from_file("./Game.Protocol.json")?;
//!
//! // Recover and render the schema
//! let text = Extractor::new(Strategy::Contract).render(&module)?;
//! println!("{}", text);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`MetadataProvider`]: Plug in another metadata source
//! - [`ProtoWriter`]: Observe the recovered schema element by element

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod descriptor;
pub mod error;
pub mod extract;
pub mod metadata;
pub mod proto;
pub mod schema;
pub mod typemap;

// Re-export primary types for convenience
pub use error::{Error, Result};
pub use extract::{Extractor, ExtractorConfig, Strategy};
pub use metadata::{MetadataProvider, Module};
pub use proto::{EmitterConfig, ProtoWriter, StatsWriter};
pub use schema::{MergedFile, ProtoFile};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
