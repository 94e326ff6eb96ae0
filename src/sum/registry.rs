use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::core::{SumType, Variant};
use crate::error::ConfigurationError;

/// Implementation bound to a contract term.
///
/// Two implementations are the same binding when their ids are equal, which is
/// what makes re-scanning a package harmless.
#[derive(Clone)]
pub struct Implementation {
    id: Cow<'static, str>,
    value: Arc<dyn Any + Send + Sync>,
}

impl Implementation {
    pub fn new<T: Any + Send + Sync>(id: impl Into<Cow<'static, str>>, value: T) -> Self {
        Self {
            id: id.into(),
            value: Arc::new(value),
        }
    }

    pub fn from_arc(id: impl Into<Cow<'static, str>>, value: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Implementation").field(&self.id).finish()
    }
}

/// Scan-time declaration binding one variant's contract term.
#[derive(Debug, Clone)]
pub struct ContractBinding {
    pub sum_type: String,
    pub variant: String,
    pub term: String,
    pub implementation: Implementation,
}

impl ContractBinding {
    pub fn new(
        sum_type: impl Into<String>,
        variant: impl Into<String>,
        term: impl Into<String>,
        implementation: Implementation,
    ) -> Self {
        Self {
            sum_type: sum_type.into(),
            variant: variant.into(),
            term: term.into(),
            implementation,
        }
    }
}

type BindingKey = (String, String, String);

/// Every declared sum type plus its contract bindings.
#[derive(Default, Debug)]
pub struct SumTypeRegistry {
    types: Vec<Arc<SumType>>,
    by_path: HashMap<String, usize>,
    bindings: HashMap<BindingKey, Implementation>,
}

impl SumTypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a sum type. Declaring the very same type again is a no-op.
    pub fn declare(&mut self, sum: Arc<SumType>) -> Result<(), ConfigurationError> {
        if let Some(idx) = self.by_path.get(sum.path()) {
            if Arc::ptr_eq(&self.types[*idx], &sum) {
                return Ok(());
            }
            return Err(ConfigurationError::DuplicateSumType(sum.path().to_string()));
        }
        debug!(
            sum_type = %sum.path(),
            variants = sum.variants().len(),
            contract_terms = ?sum.contract_terms(),
            "Sum type declared"
        );
        self.by_path.insert(sum.path().to_string(), self.types.len());
        self.types.push(sum);
        Ok(())
    }

    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&Arc<SumType>> {
        self.by_path.get(path).map(|idx| &self.types[*idx])
    }

    /// Declared types in declaration order.
    #[must_use]
    pub fn types(&self) -> &[Arc<SumType>] {
        &self.types
    }

    /// Bind `implementation` to `(variant, term)`.
    ///
    /// Rebinding an identical implementation succeeds silently; a different one is a conflict.
    pub fn bind(&mut self, binding: ContractBinding) -> Result<(), ConfigurationError> {
        let ContractBinding {
            sum_type,
            variant,
            term,
            implementation,
        } = binding;

        let sum = self
            .resolve(&sum_type)
            .ok_or_else(|| ConfigurationError::UnknownSumType(sum_type.clone()))?;
        if sum.variant(&variant).is_none() {
            return Err(ConfigurationError::UnknownVariant { sum_type, variant });
        }
        if !sum.contract_terms().iter().any(|t| *t == term) {
            return Err(ConfigurationError::UnknownContractTerm { sum_type, term });
        }

        let key = (sum_type, variant, term);
        if let Some(existing) = self.bindings.get(&key) {
            if existing.id() == implementation.id() {
                debug!(
                    sum_type = %key.0,
                    variant = %key.1,
                    term = %key.2,
                    implementation = %implementation.id(),
                    "Contract binding repeated, keeping existing"
                );
                return Ok(());
            }
            let (sum_type, variant, term) = key;
            return Err(ConfigurationError::ConflictingBinding {
                existing: existing.id().to_string(),
                offered: implementation.id().to_string(),
                sum_type,
                variant,
                term,
            });
        }

        debug!(
            sum_type = %key.0,
            variant = %key.1,
            term = %key.2,
            implementation = %implementation.id(),
            "Contract term bound"
        );
        self.bindings.insert(key, implementation);
        Ok(())
    }

    #[must_use]
    pub fn implementation(&self, variant: &Variant, term: &str) -> Option<&Implementation> {
        self.bindings.get(&(
            variant.sum_type().to_string(),
            variant.name().to_string(),
            term.to_string(),
        ))
    }

    /// Typed view of [`implementation`](Self::implementation).
    #[must_use]
    pub fn implementation_as<T: Any>(&self, variant: &Variant, term: &str) -> Option<&T> {
        self.implementation(variant, term)?.downcast_ref::<T>()
    }

    /// Every declared `(variant, term)` pair must be bound.
    pub fn check_consistency(&self) -> Result<(), ConfigurationError> {
        for sum in &self.types {
            for variant in sum.variants() {
                for term in sum.contract_terms() {
                    if self.implementation(variant, term).is_none() {
                        return Err(ConfigurationError::UnboundContractTerm {
                            sum_type: sum.path().to_string(),
                            variant: variant.name().to_string(),
                            term: term.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
