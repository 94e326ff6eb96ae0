use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::Configurator;
use crate::error::ConfigurationError;
use crate::sum::{ContractBinding, SumType};
use crate::views::ViewDecl;

/// A declarative descriptor applied during [`Configurator::scan`].
#[derive(Debug, Clone)]
pub enum Declaration {
    View(ViewDecl),
    Bind(ContractBinding),
}

impl From<ViewDecl> for Declaration {
    fn from(decl: ViewDecl) -> Self {
        Declaration::View(decl)
    }
}

impl From<ContractBinding> for Declaration {
    fn from(binding: ContractBinding) -> Self {
        Declaration::Bind(binding)
    }
}

/// An application package that can be included and scanned.
///
/// `name` doubles as the route namespace while the package is configured.
pub trait Package: Send + Sync {
    fn name(&self) -> &str;

    /// Sum types the package declares; registered before `includeme` runs.
    fn sum_types(&self) -> Result<Vec<Arc<SumType>>, ConfigurationError> {
        Ok(Vec::new())
    }

    /// Register routes, predicate kinds and directives.
    fn includeme(&self, config: &mut Configurator) -> Result<(), ConfigurationError>;

    /// Views and contract bindings applied by [`Configurator::scan`].
    fn declarations(&self) -> Result<Vec<Declaration>, ConfigurationError> {
        Ok(Vec::new())
    }
}

impl fmt::Debug for dyn Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Package").field(&self.name()).finish()
    }
}

/// A named configuration function invoked by setup steps.
pub type Directive =
    Arc<dyn Fn(&mut Configurator, &Value) -> Result<(), ConfigurationError> + Send + Sync>;
