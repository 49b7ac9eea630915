//! Provenance marks for values derived through `use` relations.
//!
//! When a module uses another module, settings filled from the used module's
//! outputs are wrapped in a [`Marked`] value naming the contributors. After
//! expansion the marks tell which `use` declarations actually contributed.

use std::collections::BTreeSet;

use crate::blueprint::{Module, ModuleId};
use crate::value::{Marked, Value};

/// Sorted, de-duplicated set of module IDs that contributed to a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UseMark {
    modules: BTreeSet<ModuleId>,
}

impl UseMark {
    pub fn new(ids: impl IntoIterator<Item = ModuleId>) -> Self {
        Self {
            modules: ids.into_iter().collect(),
        }
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.iter()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Tag `value` with the given module IDs.
///
/// Marking an already marked value unions the two sets.
pub fn mark<I>(value: Value, ids: I) -> Value
where
    I: IntoIterator<Item = ModuleId>,
{
    let (value, mut mark) = match value {
        Value::Marked(m) => {
            let Marked { value, mark } = *m;
            (value, mark)
        }
        v => (v, UseMark::default()),
    };
    mark.modules.extend(ids);
    Value::Marked(Box::new(Marked { value, mark }))
}

/// Module IDs that tagged `value`, sorted. Unmarked values yield an empty list.
pub fn unmark(value: &Value) -> Vec<ModuleId> {
    match value {
        Value::Marked(m) => m.mark.modules().cloned().collect(),
        _ => Vec::new(),
    }
}

/// Every module ID found in a mark anywhere in `value`.
pub fn contributors(value: &Value) -> BTreeSet<ModuleId> {
    let mut found = BTreeSet::new();
    value.walk(&mut |_, v| found.extend(unmark(v)));
    found
}

impl Module {
    /// Modules in `use` whose outputs never made it into any setting.
    pub fn list_unused_modules(&self) -> Vec<ModuleId> {
        let used: BTreeSet<ModuleId> = self.settings.values().flat_map(contributors).collect();
        self.uses
            .iter()
            .filter(|id| !used.contains(*id))
            .cloned()
            .collect()
    }
}
