//! In-memory formula catalog.

use std::collections::HashMap;

use parking_lot::RwLock;

use platecalc_core::formula::Formula;

use crate::interfaces::{FormulaCatalog, ResolveError};

/// Formulas grouped by category, kept in insertion order per category.
#[derive(Default)]
pub struct InMemoryFormulaCatalog {
    by_category: RwLock<HashMap<String, Vec<Formula>>>,
}

impl InMemoryFormulaCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a formula (matched by id within its category).
    pub fn insert(&self, formula: Formula) {
        let mut map = self.by_category.write();
        let formulas = map.entry(formula.category.clone()).or_default();
        match formulas.iter_mut().find(|f| f.id == formula.id) {
            Some(existing) => *existing = formula,
            None => formulas.push(formula),
        }
    }

    /// Total number of formulas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_category.read().values().map(Vec::len).sum()
    }

    /// Whether the catalog holds no formulas.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Formula> for InMemoryFormulaCatalog {
    fn from_iter<I: IntoIterator<Item = Formula>>(iter: I) -> Self {
        let catalog = Self::new();
        for formula in iter {
            catalog.insert(formula);
        }
        catalog
    }
}

impl FormulaCatalog for InMemoryFormulaCatalog {
    fn formulas_by_category(&self, category: &str) -> Result<Vec<Formula>, ResolveError> {
        Ok(self
            .by_category
            .read()
            .get(category)
            .cloned()
            .unwrap_or_default())
    }
}
