/// Lowering: element tree to Document IR
///
/// A `Lowerer` walks one source tree depth-first. Root tags and special
/// components dispatch through static `tag -> handler` tables; everything
/// else goes through generic block lowering. A pre-scan runs first so that
/// runtime activation and variable declarations are known before any
/// expression is lowered.

mod attrs;
mod blocks;
mod documents;
mod expr;
mod runtime;
pub mod text;

use crate::bundle::FunctionRegistry;
use crate::diagnostic::{Diagnostic, Location, SourceFile};
use crate::error::{CompileError, Result};
use crate::ir::{BranchCondition, Document, FunctionDescriptor, HelperDescriptor, Shape, VarRef};
use quire_parser::{Element, SourceTree, Span};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub use attrs::literal_value;

/// Elements handled by the runtime transform
pub const RUNTIME_TAGS: &[&str] = &[
    "Variable",
    "Function",
    "Helper",
    "Call",
    "If",
    "Else",
    "Loop",
    "Break",
    "Return",
    "AskUser",
    "SpawnAgent",
];

/// A document after lowering, with everything cross-document validation needs
#[derive(Debug)]
pub struct LoweredDocument {
    pub source: Arc<SourceFile>,
    pub document: Document,
    /// Location of the root element
    pub location: Location,
    pub group: String,
    pub call_sites: Vec<CallSite>,
    pub spawn_sites: Vec<SpawnSite>,
    pub warnings: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct CallSite {
    pub function: String,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct SpawnSite {
    pub agent: String,
    /// Input names passed, `None` for a literal prompt
    pub inputs: Option<Vec<String>>,
    pub location: Location,
}

#[derive(Debug, Clone)]
struct VarInfo {
    var: VarRef,
    shape: Shape,
}

/// Break found while lowering a loop body
struct BreakSite {
    /// Branch conditions between the loop and the `Break`
    conditions: Vec<BranchCondition>,
    span: Span,
}

struct LoopFrame {
    /// Depth of the condition stack when the loop started
    condition_base: usize,
    breaks: Vec<BreakSite>,
}

pub(crate) struct Lowerer<'r> {
    source: Arc<SourceFile>,
    registry: &'r FunctionRegistry,
    runtime: bool,
    runtime_allowed: bool,
    root_name: String,
    variables: BTreeMap<String, VarInfo>,
    functions: Vec<FunctionDescriptor>,
    helpers: Vec<HelperDescriptor>,
    call_sites: Vec<CallSite>,
    spawn_sites: Vec<SpawnSite>,
    warnings: Vec<Diagnostic>,
    /// Enclosing element names, innermost last
    parents: Vec<String>,
    loops: Vec<LoopFrame>,
    /// Enclosing `If` conditions, innermost last
    conditions: Vec<BranchCondition>,
    step_counter: u32,
}

/// Lower one parsed source file. Functions and helpers it declares are
/// inserted into `registry` once the whole document lowered successfully.
pub fn lower_document(
    source: Arc<SourceFile>,
    tree: &SourceTree,
    registry: &FunctionRegistry,
) -> Result<LoweredDocument> {
    let root = &tree.root;
    let Some(handler) = documents::root_handler(&root.name) else {
        return Err(CompileError::structural(
            source.locate(root.name_span),
            format!(
                "unknown document type <{}>; expected one of {}",
                root.name,
                documents::root_names().join(", ")
            ),
        ));
    };

    let mut lowerer = Lowerer::new(source, registry, root);
    lowerer.prescan(root)?;
    debug!(
        file = %lowerer.source.path.display(),
        root = %root.name,
        runtime = lowerer.runtime,
        variables = lowerer.variables.len(),
        "lowering document"
    );
    let document = handler(&mut lowerer, root)?;
    Ok(lowerer.finish(document, root.span))
}

impl<'r> Lowerer<'r> {
    fn new(source: Arc<SourceFile>, registry: &'r FunctionRegistry, root: &Element) -> Self {
        let runtime_allowed = documents::hosts_runtime(&root.name);
        Self {
            source,
            registry,
            runtime: root.name == "RuntimeCommand",
            runtime_allowed,
            root_name: root.name.clone(),
            variables: BTreeMap::new(),
            functions: Vec::new(),
            helpers: Vec::new(),
            call_sites: Vec::new(),
            spawn_sites: Vec::new(),
            warnings: Vec::new(),
            parents: Vec::new(),
            loops: Vec::new(),
            conditions: Vec::new(),
            step_counter: 0,
        }
    }

    /// First pass: decide runtime activation and collect declarations
    fn prescan(&mut self, element: &Element) -> Result<()> {
        for child in element.child_elements() {
            if RUNTIME_TAGS.contains(&child.name.as_str()) {
                if !self.runtime_allowed {
                    return Err(self.structural(
                        child.name_span,
                        format!(
                            "<{}> is not allowed in a <{}> document",
                            child.name, self.root_name
                        ),
                    ));
                }
                self.runtime = true;
            }
            match child.name.as_str() {
                "Variable" => {
                    let name = self.required_string(child, "name")?;
                    let shell = match self.string_attr(child, "env")? {
                        Some(env) => env,
                        None => shell_name(&name),
                    };
                    let shape = self.shape_attr(child, "type")?;
                    self.declare(child, name, shell, shape)?;
                }
                "Loop" => {
                    if let Some(counter) = self.string_attr(child, "counter")? {
                        let shell = shell_name(&counter);
                        self.declare(child, counter, shell, Shape::Number)?;
                    }
                }
                _ => {}
            }
            self.prescan(child)?;
        }
        Ok(())
    }

    fn declare(&mut self, element: &Element, name: String, shell: String, shape: Shape) -> Result<()> {
        if self.variables.contains_key(&name) {
            return Err(self.structural(
                element.span,
                format!("runtime variable '{}' is declared more than once", name),
            ));
        }
        let var = VarRef {
            name: name.clone(),
            shell,
        };
        self.variables.insert(name, VarInfo { var, shape });
        Ok(())
    }

    fn finish(self, document: Document, root_span: Span) -> LoweredDocument {
        let group = self.source.group();
        for function in self.functions {
            self.registry.insert_function(function);
        }
        for helper in self.helpers {
            self.registry.insert_helper(helper);
        }
        for site in &self.call_sites {
            self.registry.record_usage(&site.function, &group);
        }
        LoweredDocument {
            location: self.source.locate(root_span),
            source: self.source,
            document,
            group,
            call_sites: self.call_sites,
            spawn_sites: self.spawn_sites,
            warnings: self.warnings,
        }
    }

    fn locate(&self, span: Span) -> Location {
        self.source.locate(span)
    }

    fn structural(&self, span: Span, message: impl Into<String>) -> CompileError {
        CompileError::structural(self.locate(span), message)
    }

    fn warn(&mut self, span: Span, message: impl Into<String>) {
        let diagnostic = Diagnostic::warning(self.locate(span), message);
        if !self.warnings.contains(&diagnostic) {
            self.warnings.push(diagnostic);
        }
    }

    fn variable(&self, name: &str) -> Option<&VarInfo> {
        self.variables.get(name)
    }

    /// Resolve an `output="var"` attribute to a declared variable
    fn output_var(&self, element: &Element) -> Result<Option<VarRef>> {
        let Some(name) = self.string_attr(element, "output")? else {
            return Ok(None);
        };
        match self.variable(&name) {
            Some(info) => Ok(Some(info.var.clone())),
            None => Err(self.structural(
                element.attr("output").map(|a| a.span).unwrap_or(element.span),
                format!(
                    "output variable '{}' of <{}> is not declared; add <Variable name=\"{}\" />",
                    name, element.name, name
                ),
            )),
        }
    }
}

/// Default shell name for a runtime variable: `buildResult` -> `BUILD_RESULT`
pub fn shell_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push('_');
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_name() {
        assert_eq!(shell_name("ctx"), "CTX");
        assert_eq!(shell_name("buildResult"), "BUILD_RESULT");
        assert_eq!(shell_name("api-key"), "API_KEY");
        assert_eq!(shell_name("HTTPCode"), "HTTPCODE");
    }
}
