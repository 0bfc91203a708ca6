//! Block validation pipeline.
//!
//! Validators run in declared order over a shared context; each returns a
//! [`ValidationOutcome`]. The first non-clean outcome short-circuits the
//! fold, except warnings, which are recorded and execution continues.

pub mod plugins;

use conclave_ledger::{Block, WalletsCache};
use conclave_store::BlockStore;
use tracing::{debug, warn};

pub use plugins::default_plugins;

/// Severity of a single validator's verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationOutcome {
    NoError,
    Warning,
    Error,
    /// Chain integrity is broken; the node must stop participating.
    Fatal,
}

/// Shared read-only context handed to every plugin.
pub struct ValidationContext<'a> {
    /// The block currently at the chain head.
    pub prev_block: &'a Block,
    /// The chain storage, for consensus-pool lookups.
    pub store: &'a dyn BlockStore,
    /// Recent wallet snapshot, for compact-address resolution.
    pub wallets: Option<&'a WalletsCache>,
}

/// One link in the pipeline.
pub trait ValidationPlugin: Send {
    fn name(&self) -> &'static str;
    fn validate(&self, block: &Block, ctx: &ValidationContext) -> ValidationOutcome;
}

/// Result of a full pipeline run.
#[derive(Debug)]
pub struct ValidationReport {
    pub outcome: ValidationOutcome,
    /// Names of plugins that returned warnings.
    pub warnings: Vec<&'static str>,
}

impl ValidationReport {
    /// Whether the block may be accepted (warnings do not block).
    pub fn is_acceptable(&self) -> bool {
        matches!(
            self.outcome,
            ValidationOutcome::NoError | ValidationOutcome::Warning
        )
    }

    pub fn is_fatal(&self) -> bool {
        self.outcome == ValidationOutcome::Fatal
    }
}

/// The ordered pipeline.
pub struct BlockValidator {
    plugins: Vec<Box<dyn ValidationPlugin>>,
}

impl BlockValidator {
    pub fn new(plugins: Vec<Box<dyn ValidationPlugin>>) -> Self {
        Self { plugins }
    }

    /// The standard pipeline in its declared order.
    pub fn with_default_plugins() -> Self {
        Self::new(default_plugins())
    }

    pub fn validate(&self, block: &Block, ctx: &ValidationContext) -> ValidationReport {
        let mut warnings = Vec::new();
        for plugin in &self.plugins {
            match plugin.validate(block, ctx) {
                ValidationOutcome::NoError => {
                    debug!(plugin = plugin.name(), sequence = block.sequence, "clean");
                }
                ValidationOutcome::Warning => {
                    warn!(plugin = plugin.name(), sequence = block.sequence, "warning");
                    warnings.push(plugin.name());
                }
                outcome => {
                    return ValidationReport { outcome, warnings };
                }
            }
        }
        ValidationReport {
            outcome: if warnings.is_empty() {
                ValidationOutcome::NoError
            } else {
                ValidationOutcome::Warning
            },
            warnings,
        }
    }
}
