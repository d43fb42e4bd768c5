/// Build-wide function registry
///
/// Shared by every document task in a build. Inserts are insert-if-absent by
/// id; when two documents disagree about a definition the one with the
/// smallest origin wins, so the result never depends on task scheduling.

use crate::diagnostic::{Diagnostic, Location};
use crate::ir::{FunctionDescriptor, HelperDescriptor};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: DashMap<String, FunctionDescriptor>,
    helpers: DashMap<String, HelperDescriptor>,
    /// Function id -> groups with a call site
    usage: DashMap<String, BTreeSet<String>>,
    function_conflicts: DashMap<String, BTreeSet<Location>>,
    helper_conflicts: DashMap<String, BTreeSet<Location>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_function(&self, descriptor: FunctionDescriptor) {
        let id = descriptor.id.clone();
        let conflict = match self.functions.entry(id.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(descriptor);
                None
            }
            Entry::Occupied(mut entry) => {
                let same = entry.get().same_definition(&descriptor);
                let existing = entry.get().origin.clone();
                let incoming = descriptor.origin.clone();
                if incoming < existing {
                    entry.insert(descriptor);
                }
                (!same).then_some((existing, incoming))
            }
        };
        if let Some((existing, incoming)) = conflict {
            let mut origins = self.function_conflicts.entry(id).or_default();
            origins.insert(existing);
            origins.insert(incoming);
        }
    }

    pub fn insert_helper(&self, helper: HelperDescriptor) {
        let conflict = match self.helpers.entry(helper.name.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(helper);
                None
            }
            Entry::Occupied(mut entry) => {
                let same = entry.get().body.trim() == helper.body.trim();
                let existing = entry.get().origin.clone();
                let incoming = helper.origin.clone();
                let name = helper.name.clone();
                if incoming < existing {
                    entry.insert(helper);
                }
                (!same).then_some((name, existing, incoming))
            }
        };
        if let Some((name, existing, incoming)) = conflict {
            let mut origins = self.helper_conflicts.entry(name).or_default();
            origins.insert(existing);
            origins.insert(incoming);
        }
    }

    /// Record that a document in `group` calls `id`
    pub fn record_usage(&self, id: &str, group: &str) {
        self.usage
            .entry(id.to_string())
            .or_default()
            .insert(group.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    pub fn has_helper(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.helpers.is_empty()
    }

    /// Every function, sorted by id
    pub fn functions(&self) -> Vec<FunctionDescriptor> {
        let mut functions: Vec<FunctionDescriptor> =
            self.functions.iter().map(|f| f.value().clone()).collect();
        functions.sort_by(|a, b| a.id.cmp(&b.id));
        functions
    }

    /// Every helper, sorted by name
    pub fn helpers(&self) -> Vec<HelperDescriptor> {
        let mut helpers: Vec<HelperDescriptor> =
            self.helpers.iter().map(|h| h.value().clone()).collect();
        helpers.sort_by(|a, b| a.name.cmp(&b.name));
        helpers
    }

    /// Groups that call `id`; the declaring group when nothing calls it
    pub fn groups_using(&self, function: &FunctionDescriptor) -> BTreeSet<String> {
        match self.usage.get(&function.id) {
            Some(groups) if !groups.is_empty() => groups.clone(),
            _ => BTreeSet::from([function.group.clone()]),
        }
    }

    /// Diagnostics for names declared with differing definitions. A function
    /// conflict is a warning and the first definition is exported; helpers
    /// share one module scope, so a helper conflict is an error.
    pub fn conflict_diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for entry in self.function_conflicts.iter() {
            let mut origins = entry.value().iter();
            let Some(winner) = origins.next() else {
                continue;
            };
            for other in origins {
                diagnostics.push(
                    Diagnostic::warning(
                        other.clone(),
                        format!(
                            "function '{}' is declared with a different definition here; using the one from {}",
                            entry.key(),
                            winner
                        ),
                    )
                    .with_related(winner.clone()),
                );
            }
        }
        for entry in self.helper_conflicts.iter() {
            let mut origins = entry.value().iter();
            let Some(first) = origins.next() else {
                continue;
            };
            for other in origins {
                diagnostics.push(
                    Diagnostic::error(
                        other.clone(),
                        format!(
                            "helper '{}' conflicts with a different definition in {}",
                            entry.key(),
                            first
                        ),
                    )
                    .with_related(first.clone()),
                );
            }
        }
        diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Shape;

    fn descriptor(file: &str, body: &str) -> FunctionDescriptor {
        FunctionDescriptor {
            id: "checkStatus".into(),
            params: Shape::Any,
            returns: Shape::Bool,
            body: body.into(),
            uses: Vec::new(),
            origin: Location::file(file),
            group: file.trim_end_matches(".quire").into(),
        }
    }

    #[test]
    fn test_identical_definitions_collapse() {
        let registry = FunctionRegistry::new();
        registry.insert_function(descriptor("b.quire", "return true;"));
        registry.insert_function(descriptor("a.quire", "return true;"));
        let functions = registry.functions();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].group, "a");
        assert!(registry.conflict_diagnostics().is_empty());
    }

    #[test]
    fn test_conflict_prefers_first_file_in_any_order() {
        for order in [["a.quire", "b.quire"], ["b.quire", "a.quire"]] {
            let registry = FunctionRegistry::new();
            for file in order {
                registry.insert_function(descriptor(file, &format!("return '{}';", file)));
            }
            assert_eq!(registry.functions()[0].body, "return 'a.quire';");
            let warnings = registry.conflict_diagnostics();
            assert_eq!(warnings.len(), 1);
            assert_eq!(warnings[0].location.file.to_str(), Some("b.quire"));
        }
    }

    #[test]
    fn test_unused_function_belongs_to_declaring_group() {
        let registry = FunctionRegistry::new();
        let function = descriptor("a.quire", "return 1;");
        registry.insert_function(function.clone());
        assert_eq!(registry.groups_using(&function), BTreeSet::from(["a".to_string()]));
        registry.record_usage("checkStatus", "x");
        registry.record_usage("checkStatus", "y");
        assert_eq!(registry.groups_using(&function).len(), 2);
    }

    #[test]
    fn test_helper_conflict_is_an_error() {
        let registry = FunctionRegistry::new();
        let definitions = [
            ("a.quire", "function fmt(x) { return x; }"),
            ("b.quire", "function fmt(x) { return `${x}`; }"),
        ];
        for (file, body) in definitions {
            registry.insert_helper(HelperDescriptor {
                name: "fmt".into(),
                body: body.into(),
                origin: Location::file(file),
            });
        }
        let diagnostics = registry.conflict_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
        assert_eq!(diagnostics[0].location.file.to_str(), Some("b.quire"));
    }

    #[test]
    fn test_identical_helpers_collapse() {
        let registry = FunctionRegistry::new();
        for file in ["a.quire", "b.quire"] {
            registry.insert_helper(HelperDescriptor {
                name: "fmt".into(),
                body: "function fmt(x) { return x; }\n".into(),
                origin: Location::file(file),
            });
        }
        assert_eq!(registry.helpers().len(), 1);
        assert!(registry.conflict_diagnostics().is_empty());
    }
}
