//! Schema extraction strategies.
//!
//! Two independent strategies recover a [`ProtoFile`] from a module:
//!
//! - [`DescriptorWalk`] for Google.Protobuf generated code, which carries
//!   a reflection descriptor per message
//! - [`ContractScan`] for protobuf-net contract types, annotated member by
//!   member, with oneof membership only visible in generated method bodies
//!
//! Both contain failures to the type being extracted: a type that cannot
//! be resolved degrades to an `// Error:` marker or is skipped, and the
//! rest of the module is still extracted. Only a missing runtime
//! reference aborts a run; a module without qualifying types renders
//! as a header-only file.

mod contract_scan;
pub mod convention;
mod descriptor_walk;

use crate::error::{Error, Result};
use crate::metadata::MetadataProvider;
use crate::proto::{render_file, EmitterConfig};
use crate::schema::ProtoFile;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

pub use contract_scan::{union_group_name, ContractScan};
pub use descriptor_walk::DescriptorWalk;

/// Trait implemented by each extraction strategy
pub trait ExtractionStrategy {
    /// Convention name for diagnostics
    fn name(&self) -> &'static str;

    /// Runtime assemblies whose presence enables this strategy
    fn runtime_assemblies(&self) -> &'static [&'static str];

    /// Recovers every qualifying enum and message of the module
    fn extract<P: MetadataProvider>(&self, provider: &P) -> ProtoFile;

    /// Fails unless the module references one of the runtime assemblies
    fn check_capabilities<P: MetadataProvider>(&self, provider: &P) -> Result<()> {
        let assemblies = self.runtime_assemblies();
        if assemblies.iter().any(|a| provider.references_assembly(a)) {
            Ok(())
        } else {
            Err(Error::missing_capability(
                provider.module_name(),
                self.name(),
                assemblies,
            ))
        }
    }
}

/// Selects an extraction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Google.Protobuf descriptor walk
    Descriptor,
    /// protobuf-net attribute and bytecode scan
    Contract,
}

impl Strategy {
    /// Returns the mode name used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Descriptor => "google",
            Strategy::Contract => "protobuf-net",
        }
    }

    /// Whether output uses blank lines after nested enums and oneofs
    pub fn spaced_blocks(&self) -> bool {
        matches!(self, Strategy::Contract)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Strategy::Descriptor),
            "protobuf-net" => Ok(Strategy::Contract),
            _ => Err(Error::UnknownStrategy {
                name: s.to_string(),
            }),
        }
    }
}

/// Configuration for extraction
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Require the module to reference the convention's runtime assembly
    pub check_capabilities: bool,
    /// Emitter settings
    pub emitter: EmitterConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            check_capabilities: true,
            emitter: EmitterConfig::default(),
        }
    }
}

impl ExtractorConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the runtime reference check runs
    pub fn check_capabilities(mut self, check: bool) -> Self {
        self.check_capabilities = check;
        self
    }

    /// Sets the emitter configuration
    pub fn emitter(mut self, emitter: EmitterConfig) -> Self {
        self.emitter = emitter;
        self
    }
}

/// Runs one strategy over a module
#[derive(Debug, Clone)]
pub struct Extractor {
    strategy: Strategy,
    config: ExtractorConfig,
}

impl Extractor {
    /// Creates an extractor with default configuration
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            config: ExtractorConfig::default(),
        }
    }

    /// Creates an extractor with custom configuration
    pub fn with_config(strategy: Strategy, config: ExtractorConfig) -> Self {
        Self { strategy, config }
    }

    /// Returns the selected strategy
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Emitter settings adjusted for the selected strategy
    pub fn emitter_config(&self) -> EmitterConfig {
        let mut config = self.config.emitter.clone();
        if self.strategy.spaced_blocks() {
            config.spaced_blocks = true;
        }
        config
    }

    /// Recovers the schema model of a module
    pub fn extract<P: MetadataProvider>(&self, provider: &P) -> Result<ProtoFile> {
        match self.strategy {
            Strategy::Descriptor => self.run(&DescriptorWalk::new(), provider),
            Strategy::Contract => self.run(&ContractScan::new(), provider),
        }
    }

    /// Recovers a module and renders it as proto3 text
    pub fn render<P: MetadataProvider>(&self, provider: &P) -> Result<String> {
        let file = self.extract(provider)?;
        Ok(render_file(&file, &self.emitter_config()))
    }

    fn run<S, P>(&self, strategy: &S, provider: &P) -> Result<ProtoFile>
    where
        S: ExtractionStrategy,
        P: MetadataProvider,
    {
        if self.config.check_capabilities {
            strategy.check_capabilities(provider)?;
        } else {
            debug!("Skipping runtime reference check for {}", provider.module_name());
        }

        let file = strategy.extract(provider);
        info!(
            "Extracted {} definition(s) from {} using {}",
            file.entries.len(),
            provider.module_name(),
            strategy.name()
        );
        Ok(file)
    }
}
