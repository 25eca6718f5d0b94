use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::{CoreError, ModuleId};

/// Static description of one transaction type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTypeDefinition {
    /// Module that originates transactions of this type
    pub source: ModuleId,

    /// Modules that must be notified besides the source
    #[serde(default)]
    pub targets: Vec<ModuleId>,

    /// Human-readable description, not used in control flow
    #[serde(default)]
    pub description: String,
}

impl TransactionTypeDefinition {
    /// Create a new definition
    pub fn new(source: impl Into<ModuleId>, targets: &[&str], description: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            targets: targets.iter().map(|t| ModuleId::from(*t)).collect(),
            description: description.into(),
        }
    }

    /// Validate the definition registered under `name`
    pub fn validate(&self, name: &str) -> Result<(), CoreError> {
        if self.source.as_str().trim().is_empty() {
            return Err(CoreError::ValidationError(format!(
                "Transaction type {} has an empty source module",
                name
            )));
        }

        let mut seen = HashSet::with_capacity(self.targets.len());
        for target in &self.targets {
            if target == &self.source {
                return Err(CoreError::ValidationError(format!(
                    "Transaction type {} lists its source {} as a target",
                    name, target
                )));
            }
            if !seen.insert(target) {
                return Err(CoreError::ValidationError(format!(
                    "Transaction type {} lists target {} more than once",
                    name, target
                )));
            }
        }

        Ok(())
    }

    /// Whether the module is the source or one of the targets
    pub fn involves(&self, module: &ModuleId) -> bool {
        &self.source == module || self.targets.contains(module)
    }
}

/// Process-wide table of transaction types, fixed once built
#[derive(Debug, Clone, Default)]
pub struct TransactionTypeRegistry {
    definitions: BTreeMap<String, TransactionTypeDefinition>,
}

impl TransactionTypeRegistry {
    /// Build a validated registry.
    ///
    /// Fails on duplicate names or on an invalid definition.
    pub fn new<I, S>(definitions: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (S, TransactionTypeDefinition)>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (name, definition) in definitions {
            let name = name.into();
            definition.validate(&name)?;
            if map.insert(name.clone(), definition).is_some() {
                return Err(CoreError::ValidationError(format!(
                    "Duplicate transaction type: {}",
                    name
                )));
            }
        }
        Ok(Self { definitions: map })
    }

    pub(crate) fn from_map(definitions: BTreeMap<String, TransactionTypeDefinition>) -> Self {
        Self { definitions }
    }

    /// Validate every definition
    pub fn validate(&self) -> Result<(), CoreError> {
        self.definitions
            .iter()
            .try_for_each(|(name, definition)| definition.validate(name))
    }

    /// Resolve a type name to its definition
    pub fn resolve(&self, type_name: &str) -> Result<&TransactionTypeDefinition, CoreError> {
        self.definitions
            .get(type_name)
            .ok_or_else(|| CoreError::UnknownTransactionType(type_name.to_string()))
    }

    /// Whether the type name is known
    pub fn contains(&self, type_name: &str) -> bool {
        self.definitions.contains_key(type_name)
    }

    /// All type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        self.definitions.keys().map(String::as_str).collect()
    }

    /// Type names whose source or targets include the module
    pub fn types_for_module(&self, module: &ModuleId) -> Vec<&str> {
        self.definitions
            .iter()
            .filter(|(_, definition)| definition.involves(module))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Every module mentioned as a source or target
    pub fn modules(&self) -> BTreeSet<ModuleId> {
        self.definitions
            .values()
            .flat_map(|definition| {
                std::iter::once(&definition.source).chain(definition.targets.iter())
            })
            .cloned()
            .collect()
    }

    /// Iterate over `(name, definition)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TransactionTypeDefinition)> {
        self.definitions
            .iter()
            .map(|(name, definition)| (name.as_str(), definition))
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
