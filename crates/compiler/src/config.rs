//! Compiler configuration: the knobs `compile(sources, output, references)`
//! accepts beyond the bare source list.

use std::path::PathBuf;

/// How much of the optimizer pipeline runs after IR lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    /// IR is emitted as lowered, with no simplification or unreachable-code
    /// pass. Useful for `dump-ir` debugging where the raw lowering matters.
    None,
    /// Algebraic simplification followed by unreachable-code elimination.
    /// The default for `build`/`check`.
    #[default]
    Basic,
}

/// A precompiled reference assembly's symbol table, loaded read-only
/// before compiling the active sources: foreign sealed symbol tables are
/// read-only once loaded.
///
/// Assembly loading/linking itself is out of scope here (final codegen
/// and cross-assembly linking mechanics are a backend concern); this
/// only records which paths a caller asked to have available.
#[derive(Debug, Clone)]
pub struct ReferenceAssembly {
    pub path: PathBuf,
}

impl ReferenceAssembly {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Configuration for a single `compile` invocation.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Locale used to format diagnostic text. Only `"en-US"` resolves to
    /// a real [`hxsl_core::LocaleTable`] today; anything else falls back
    /// to it rather than failing the whole compilation over a missing
    /// locale pack.
    pub locale: String,
    pub optimization_level: OptimizationLevel,
    pub reference_assemblies: Vec<ReferenceAssembly>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            optimization_level: OptimizationLevel::default(),
            reference_assemblies: Vec::new(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_optimization_level(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    pub fn with_reference_assembly(mut self, assembly: ReferenceAssembly) -> Self {
        self.reference_assemblies.push(assembly);
        self
    }

    pub fn with_reference_assemblies(mut self, assemblies: impl IntoIterator<Item = ReferenceAssembly>) -> Self {
        self.reference_assemblies.extend(assemblies);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_runs_basic_optimization_in_en_us() {
        let config = CompilerConfig::default();
        assert_eq!(config.locale, "en-US");
        assert_eq!(config.optimization_level, OptimizationLevel::Basic);
        assert!(config.reference_assemblies.is_empty());
    }

    #[test]
    fn builder_methods_compose() {
        let config = CompilerConfig::new()
            .with_locale("en-GB")
            .with_optimization_level(OptimizationLevel::None)
            .with_reference_assembly(ReferenceAssembly::new("/lib/std.hxslasm"));

        assert_eq!(config.locale, "en-GB");
        assert_eq!(config.optimization_level, OptimizationLevel::None);
        assert_eq!(config.reference_assemblies.len(), 1);
    }
}
