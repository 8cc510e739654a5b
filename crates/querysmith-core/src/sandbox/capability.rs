//! Sandbox capabilities: the allow-list axis for what a candidate program can call.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A group of functions the sandbox may expose to a candidate program.
///
/// The first eight groups are pure data manipulation. `Records` and
/// `Tables` are read-only data access that resolves against the
/// [`ExecutionContext`](crate::domain::ExecutionContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Arithmetic,
    Logic,
    Strings,
    Arrays,
    Maps,
    Iteration,
    Math,
    Dates,
    Records,
    Tables,
}

impl Capability {
    /// Whether this capability touches the execution context.
    pub fn is_data_access(self) -> bool {
        matches!(self, Capability::Records | Capability::Tables)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Arithmetic => write!(f, "arithmetic"),
            Capability::Logic => write!(f, "logic"),
            Capability::Strings => write!(f, "strings"),
            Capability::Arrays => write!(f, "arrays"),
            Capability::Maps => write!(f, "maps"),
            Capability::Iteration => write!(f, "iteration"),
            Capability::Math => write!(f, "math"),
            Capability::Dates => write!(f, "dates"),
            Capability::Records => write!(f, "records"),
            Capability::Tables => write!(f, "tables"),
        }
    }
}

/// The explicit set of capabilities handed to one sandboxed run.
///
/// Built per invocation and passed by value; anything absent is simply
/// not registered, so calling it fails as an unknown function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityTable {
    capabilities: BTreeSet<Capability>,
}

impl CapabilityTable {
    /// No capabilities at all. Only built-in operators remain.
    pub fn empty() -> Self {
        Self {
            capabilities: BTreeSet::new(),
        }
    }

    /// Every pure group, without data access.
    pub fn pure_only() -> Self {
        Self::empty()
            .with(Capability::Arithmetic)
            .with(Capability::Logic)
            .with(Capability::Strings)
            .with(Capability::Arrays)
            .with(Capability::Maps)
            .with(Capability::Iteration)
            .with(Capability::Math)
            .with(Capability::Dates)
    }

    /// The standard query table: pure groups plus records and tables.
    pub fn standard() -> Self {
        Self::pure_only()
            .with(Capability::Records)
            .with(Capability::Tables)
    }

    /// Add a capability and return `self` (builder pattern).
    pub fn with(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn without(mut self, capability: Capability) -> Self {
        self.capabilities.remove(&capability);
        self
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.capabilities.iter().copied()
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_covers_all_variants() {
        assert_eq!(Capability::Arithmetic.to_string(), "arithmetic");
        assert_eq!(Capability::Logic.to_string(), "logic");
        assert_eq!(Capability::Strings.to_string(), "strings");
        assert_eq!(Capability::Arrays.to_string(), "arrays");
        assert_eq!(Capability::Maps.to_string(), "maps");
        assert_eq!(Capability::Iteration.to_string(), "iteration");
        assert_eq!(Capability::Math.to_string(), "math");
        assert_eq!(Capability::Dates.to_string(), "dates");
        assert_eq!(Capability::Records.to_string(), "records");
        assert_eq!(Capability::Tables.to_string(), "tables");
    }

    #[test]
    fn test_standard_includes_data_access() {
        let table = CapabilityTable::standard();
        assert!(table.allows(Capability::Records));
        assert!(table.allows(Capability::Tables));
        assert_eq!(table.iter().count(), 10);
    }

    #[test]
    fn test_pure_only_excludes_data_access() {
        let table = CapabilityTable::pure_only();
        assert!(table.iter().all(|c| !c.is_data_access()));
        assert!(table.allows(Capability::Dates));
    }

    #[test]
    fn test_without_removes() {
        let table = CapabilityTable::standard().without(Capability::Tables);
        assert!(!table.allows(Capability::Tables));
        assert!(table.allows(Capability::Records));
    }

    #[test]
    fn test_serde_roundtrip() {
        let table = CapabilityTable::empty().with(Capability::Strings);
        let json = serde_json::to_string(&table).unwrap();
        let back: CapabilityTable = serde_json::from_str(&json).unwrap();
        assert_eq!(table, back);
    }
}
