/// Runtime module bundling
///
/// Turns the registry into JavaScript. Both strategies export one function
/// per id and dispatch on the same id string that call sites pass to the
/// runtime entry, so emitted invocations work with either layout.

use super::FunctionRegistry;
use crate::emit::Artifact;
use crate::error::Result;
use crate::ir::{FunctionDescriptor, HelperDescriptor, Shape};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::debug;

pub const RUNTIME_DIR: &str = "runtime";
pub const COMMON_CHUNK: &str = "common";

const HEADER: &str = "// Generated by quirec. Do not edit.\n";

/// Names a function id may not take: bindings of the generated module,
/// globals the dispatcher relies on and JavaScript reserved words
const RESERVED_IDS: &[&str] = &[
    "main", "registry", "process", "console", "JSON", "Error", "String", "await", "break",
    "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
    "implements", "import", "in", "instanceof", "interface", "let", "new", "null", "package",
    "private", "protected", "public", "return", "static", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "yield", "arguments", "eval",
];

/// Whether `id` would clash with the runtime module's own bindings
pub fn is_reserved_id(id: &str) -> bool {
    RESERVED_IDS.contains(&id)
}

/// Reads `<id> '<json-args>'` from argv and prints the JSON result
const DISPATCHER: &str = r#"async function main(argv) {
  const [id, raw] = argv;
  const fn = registry[id];
  if (!fn) {
    console.error(`Unknown runtime function: ${id}`);
    process.exit(2);
  }
  const args = raw ? JSON.parse(raw) : {};
  const result = await fn(args);
  if (result !== undefined) {
    process.stdout.write(JSON.stringify(result));
  }
}

main(process.argv.slice(2)).catch((err) => {
  console.error(err instanceof Error ? err.message : String(err));
  process.exit(1);
});
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BundleStrategy {
    /// One `runtime.js` holding everything
    #[default]
    SingleEntry,
    /// A chunk per document group plus a common chunk for shared code
    CodeSplit,
}

/// Produce the runtime module artifacts; nothing when no function or helper
/// was declared
pub fn bundle(registry: &FunctionRegistry, strategy: BundleStrategy) -> Result<Vec<Artifact>> {
    if registry.is_empty() {
        return Ok(Vec::new());
    }
    let functions = registry.functions();
    let helpers = registry.helpers();
    debug!(
        functions = functions.len(),
        helpers = helpers.len(),
        ?strategy,
        "bundling runtime"
    );
    match strategy {
        BundleStrategy::SingleEntry => single_entry(&functions, &helpers),
        BundleStrategy::CodeSplit => code_split(registry, &functions, &helpers),
    }
}

fn runtime_path(file: &str) -> PathBuf {
    PathBuf::from(RUNTIME_DIR).join(file)
}

fn single_entry(functions: &[FunctionDescriptor], helpers: &[HelperDescriptor]) -> Result<Vec<Artifact>> {
    let mut out = String::from(HEADER);
    for helper in helpers {
        write!(out, "\n{}\n", helper.body.trim_end())?;
    }
    for function in functions {
        out.push('\n');
        write_function(&mut out, function)?;
    }
    out.push('\n');
    write_registry(&mut out, functions.iter().map(|f| f.id.as_str()))?;
    out.push('\n');
    out.push_str(DISPATCHER);
    Ok(vec![Artifact::Generated {
        path: runtime_path("runtime.js"),
        content: out,
    }])
}

/// File stem of a group's chunk; never collides with the common chunk
fn chunk_name(group: &str) -> String {
    if group == COMMON_CHUNK {
        format!("{}_group", group)
    } else {
        group.to_string()
    }
}

fn code_split(
    registry: &FunctionRegistry,
    functions: &[FunctionDescriptor],
    helpers: &[HelperDescriptor],
) -> Result<Vec<Artifact>> {
    let mut common: Vec<&FunctionDescriptor> = Vec::new();
    let mut chunks: BTreeMap<String, Vec<&FunctionDescriptor>> = BTreeMap::new();
    for function in functions {
        let groups = registry.groups_using(function);
        match groups.iter().next() {
            Some(group) if groups.len() == 1 => {
                chunks.entry(chunk_name(group)).or_default().push(function)
            }
            _ => common.push(function),
        }
    }

    let mut artifacts = Vec::new();
    let mut imports: Vec<(String, Vec<&str>)> = Vec::new();
    let helper_names: BTreeSet<&str> = helpers.iter().map(|h| h.name.as_str()).collect();

    if !common.is_empty() || !helpers.is_empty() {
        let mut out = String::from(HEADER);
        for helper in helpers {
            write!(out, "\n{}\n", helper.body.trim_end())?;
        }
        for function in &common {
            out.push('\n');
            write_function(&mut out, function)?;
        }
        if !helpers.is_empty() {
            let names: Vec<&str> = helper_names.iter().copied().collect();
            write!(out, "\nexport {{ {} }};\n", names.join(", "))?;
        }
        artifacts.push(Artifact::Generated {
            path: runtime_path(&format!("chunks/{}.js", COMMON_CHUNK)),
            content: out,
        });
        if !common.is_empty() {
            imports.push((
                COMMON_CHUNK.to_string(),
                common.iter().map(|f| f.id.as_str()).collect(),
            ));
        }
    }

    for (chunk, members) in &chunks {
        let used: BTreeSet<&str> = members
            .iter()
            .flat_map(|f| f.uses.iter().map(String::as_str))
            .filter(|name| helper_names.contains(name))
            .collect();
        let mut out = String::from(HEADER);
        if !used.is_empty() {
            let names: Vec<&str> = used.into_iter().collect();
            write!(out, "\nimport {{ {} }} from './{}.js';\n", names.join(", "), COMMON_CHUNK)?;
        }
        for function in members {
            out.push('\n');
            write_function(&mut out, function)?;
        }
        artifacts.push(Artifact::Generated {
            path: runtime_path(&format!("chunks/{}.js", chunk)),
            content: out,
        });
        imports.push((chunk.clone(), members.iter().map(|f| f.id.as_str()).collect()));
    }

    imports.sort();
    let mut entry = String::from(HEADER);
    entry.push('\n');
    for (chunk, ids) in &imports {
        writeln!(entry, "import {{ {} }} from './chunks/{}.js';", ids.join(", "), chunk)?;
    }
    entry.push('\n');
    write_registry(&mut entry, functions.iter().map(|f| f.id.as_str()))?;
    entry.push('\n');
    entry.push_str(DISPATCHER);
    artifacts.push(Artifact::Generated {
        path: runtime_path("runtime.js"),
        content: entry,
    });
    Ok(artifacts)
}

fn write_function(out: &mut String, function: &FunctionDescriptor) -> Result<()> {
    out.push_str("/**\n");
    writeln!(out, " * @param {{{}}} args", jsdoc_type(&function.params))?;
    writeln!(out, " * @returns {{Promise<{}>}}", jsdoc_type(&function.returns))?;
    out.push_str(" */\n");
    writeln!(out, "export async function {}(args) {{", function.id)?;
    for line in function.body.lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            writeln!(out, "  {}", line)?;
        }
    }
    out.push_str("}\n");
    Ok(())
}

fn jsdoc_type(shape: &Shape) -> String {
    match shape {
        Shape::Any => "*".to_string(),
        other => other.to_string(),
    }
}

fn write_registry<'a>(out: &mut String, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    out.push_str("export const registry = {\n");
    for id in ids {
        writeln!(out, "  {},", id)?;
    }
    out.push_str("};\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Location;

    fn function(id: &str, file: &str, uses: &[&str]) -> FunctionDescriptor {
        FunctionDescriptor {
            id: id.into(),
            params: Shape::parse("string").unwrap(),
            returns: Shape::Bool,
            body: "return args.length > 0;".into(),
            uses: uses.iter().map(|u| u.to_string()).collect(),
            origin: Location::file(file),
            group: file.trim_end_matches(".quire").into(),
        }
    }

    fn content<'a>(artifacts: &'a [Artifact], path: &str) -> &'a str {
        artifacts
            .iter()
            .find_map(|a| match a {
                Artifact::Generated { path: p, content } if p == &PathBuf::from(path) => {
                    Some(content.as_str())
                }
                _ => None,
            })
            .unwrap_or_else(|| panic!("missing artifact {}", path))
    }

    #[test]
    fn test_dispatcher_bindings_are_reserved() {
        assert!(is_reserved_id("main"));
        assert!(is_reserved_id("registry"));
        assert!(is_reserved_id("class"));
        assert!(!is_reserved_id("checkStatus"));
    }

    #[test]
    fn test_single_entry_exports_and_registry() {
        let registry = FunctionRegistry::new();
        registry.insert_function(function("isSet", "a.quire", &[]));
        let artifacts = bundle(&registry, BundleStrategy::SingleEntry).unwrap();
        assert_eq!(artifacts.len(), 1);
        let js = content(&artifacts, "runtime/runtime.js");
        assert!(js.contains(" * @param {string} args\n"));
        assert!(js.contains("export async function isSet(args) {\n  return args.length > 0;\n}\n"));
        assert!(js.contains("export const registry = {\n  isSet,\n};\n"));
        assert!(js.contains("main(process.argv.slice(2))"));
    }

    #[test]
    fn test_code_split_shares_common_functions() {
        let registry = FunctionRegistry::new();
        registry.insert_function(function("shared", "a.quire", &["fmt"]));
        registry.insert_function(function("onlyB", "b.quire", &["fmt"]));
        registry.insert_helper(HelperDescriptor {
            name: "fmt".into(),
            body: "function fmt(v) { return String(v); }".into(),
            origin: Location::file("a.quire"),
        });
        registry.record_usage("shared", "a");
        registry.record_usage("shared", "b");
        registry.record_usage("onlyB", "b");

        let artifacts = bundle(&registry, BundleStrategy::CodeSplit).unwrap();
        let common = content(&artifacts, "runtime/chunks/common.js");
        assert!(common.contains("export async function shared(args)"));
        assert!(common.contains("export { fmt };"));
        let b = content(&artifacts, "runtime/chunks/b.js");
        assert!(b.contains("import { fmt } from './common.js';"));
        assert!(b.contains("export async function onlyB(args)"));
        let entry = content(&artifacts, "runtime/runtime.js");
        assert!(entry.contains("import { onlyB } from './chunks/b.js';"));
        assert!(entry.contains("import { shared } from './chunks/common.js';"));
        assert!(entry.contains("  onlyB,\n  shared,\n"));
    }

    #[test]
    fn test_empty_registry_bundles_nothing() {
        let registry = FunctionRegistry::new();
        assert!(bundle(&registry, BundleStrategy::CodeSplit).unwrap().is_empty());
    }
}
