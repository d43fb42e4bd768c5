/// End-to-end build tests: source text in, artifacts and diagnostics out

use quire_compiler::{Build, BuildOutput, BundleStrategy, CompileOptions, SourceInput};

fn build_with(options: CompileOptions, sources: &[(&str, &str)]) -> BuildOutput {
    let inputs = sources
        .iter()
        .map(|(path, text)| SourceInput::new(*path, *text))
        .collect();
    Build::new(options)
        .run_blocking(inputs)
        .expect("runtime should start")
}

fn build(sources: &[(&str, &str)]) -> BuildOutput {
    build_with(CompileOptions::default(), sources)
}

fn content<'a>(output: &'a BuildOutput, path: &str) -> &'a str {
    output
        .content(path)
        .unwrap_or_else(|| panic!("missing artifact {}; diagnostics: {:?}", path, output.diagnostics))
}

fn errors(output: &BuildOutput) -> Vec<String> {
    output
        .diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.to_string())
        .collect()
}

const DEPLOY: &str = r#"<Command name="deploy" description="Deploy the service" allowedTools={["Bash", "Read"]}>
  <h2>Setup</h2>
  <p>Run the <b>checks</b>   first.</p>
  <ul>
    <li>a<ol><li>x</li></ol></li>
    <li>b</li>
  </ul>
</Command>
"#;

const CHECK: &str = r#"<Command name="check" description="Check the build">
  <Variable name="ctx" type={{status: "string"}} />
  <Function name="checkStatus" returns={{status: "string"}}>
    return { status: "PASSED" };
  </Function>
  <Call fn="checkStatus" output="ctx" />
  <If condition={ctx.status == "PASSED"}>
    <p>Ship it.</p>
  </If>
  <Else>
    <p>Fix it.</p>
  </Else>
</Command>
"#;

const RESEARCHER: &str = r#"<Agent name="researcher" description="Finds things" tools="Read Grep">
  <Input name="topic" type="string" required description="What to research" />
  <Input name="depth" type="number" optional />
  <p>Research the topic.</p>
</Agent>
"#;

#[test]
fn test_command_markdown() {
    let output = build(&[("deploy.quire", DEPLOY)]);
    assert!(errors(&output).is_empty(), "{:?}", output.diagnostics);
    let md = content(&output, "commands/deploy.md");
    assert!(md.starts_with("---\nname: deploy\ndescription: Deploy the service\nallowed-tools:\n"));
    assert!(md.contains("- Bash\n"));
    assert!(md.ends_with(
        "---\n\n## Setup\n\nRun the **checks** first.\n\n- a\n  1. x\n- b\n"
    ));
    // inert documents bundle nothing
    assert!(output.artifact("runtime/runtime.js").is_none());
}

#[test]
fn test_invisible_and_named_groups() {
    let source = r#"<Command name="grouped" description="Groups">
  <div><p>one</p></div>
  <div name="context"><p>two</p></div>
  <XmlBlock name="objective">Ship it.</XmlBlock>
</Command>"#;
    let output = build(&[("grouped.quire", source)]);
    let md = content(&output, "commands/grouped.md");
    assert!(md.contains("\n\none\n\n<context>\ntwo\n</context>\n\n<objective>\nShip it.\n</objective>\n"));
}

#[test]
fn test_table_escaping_keeps_columns() {
    let source = r#"<Command name="flags" description="Flags">
  <Table headers={["Flag", "Meaning"]} rows={[["a|b", "pipe"], ["--x"]]} />
</Command>"#;
    let output = build(&[("flags.quire", source)]);
    let md = content(&output, "commands/flags.md");
    assert!(md.contains("| Flag | Meaning |\n| --- | --- |\n| a\\|b | pipe |\n| --x |  |"));
}

#[test]
fn test_conditional_labels_and_call() {
    let output = build(&[("check.quire", CHECK)]);
    assert!(errors(&output).is_empty(), "{:?}", output.diagnostics);
    let md = content(&output, "commands/check.md");
    assert!(md.contains("**Variable `ctx`** (`{ status: string }`) is stored in `$CTX`."));
    assert!(md.contains("CTX=$(node .claude/runtime/runtime.js checkStatus '{}')"));
    assert!(md.contains("**If ctx.status equals 'PASSED':**"));
    assert!(md.contains("jq -ne --argjson CTX \"$CTX\" '$CTX.status == \"PASSED\"' >/dev/null"));
    assert!(md.contains("Ship it.\n\n**Otherwise:**\n\nFix it."));

    let js = content(&output, "runtime/runtime.js");
    assert!(js.contains("export async function checkStatus(args) {\n  return { status: \"PASSED\" };\n}"));
    assert!(js.contains(" * @returns {Promise<{ status: string }>}"));
}

#[test]
fn test_runtime_entry_is_configurable() {
    let options = CompileOptions::default().runtime_entry("bun run .claude/runtime/runtime.js");
    let output = build_with(options, &[("check.quire", CHECK)]);
    let md = content(&output, "commands/check.md");
    assert!(md.contains("CTX=$(bun run .claude/runtime/runtime.js checkStatus '{}')"));
}

#[test]
fn test_identical_functions_export_once() {
    let other = CHECK.replace("name=\"check\"", "name=\"recheck\"");
    let output = build(&[("check.quire", CHECK), ("recheck.quire", &other)]);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let js = content(&output, "runtime/runtime.js");
    assert_eq!(js.matches("export async function checkStatus").count(), 1);
}

#[test]
fn test_conflicting_functions_warn_and_stay_deterministic() {
    let other = CHECK
        .replace("name=\"check\"", "name=\"recheck\"")
        .replace("\"PASSED\" };", "\"FAILED\" };");
    let forward = build(&[("a.quire", CHECK), ("b.quire", &other)]);
    let reverse = build(&[("b.quire", &other), ("a.quire", CHECK)]);
    assert_eq!(forward.artifacts, reverse.artifacts);
    assert_eq!(forward.diagnostics, reverse.diagnostics);

    let warning = &forward.diagnostics[0];
    assert!(!warning.is_error());
    assert_eq!(warning.location.file.to_str(), Some("b.quire"));
    assert!(warning.message.contains("function 'checkStatus'"));
    assert!(content(&forward, "runtime/runtime.js").contains("status: \"PASSED\""));
}

#[test]
fn test_build_is_repeatable() {
    let sources = [("deploy.quire", DEPLOY), ("check.quire", CHECK), ("researcher.quire", RESEARCHER)];
    let first = build(&sources);
    let second = build(&sources);
    assert_eq!(first.artifacts, second.artifacts);
    let paths: Vec<_> = first.artifacts.iter().map(|a| a.path().to_path_buf()).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
}

#[test]
fn test_agent_frontmatter_and_inputs() {
    let output = build(&[("researcher.quire", RESEARCHER)]);
    let md = content(&output, "agents/researcher.md");
    assert!(md.contains("\ntools: Read Grep\n"));
    assert!(md.contains(
        "<inputs>\n- `topic` (string, required): What to research\n- `depth` (number, optional)\n</inputs>\n\nResearch the topic."
    ));
}

const SPAWNER: &str = r#"<Command name="investigate" description="Investigate">
  <Variable name="report" />
  <SpawnAgent agent="researcher" description="Research" input={{depth: 2}} output="report" />
</Command>"#;

#[test]
fn test_missing_agent_input_warns() {
    let output = build(&[("researcher.quire", RESEARCHER), ("investigate.quire", SPAWNER)]);
    assert!(!output.has_errors());
    let warning = output
        .diagnostics
        .iter()
        .find(|d| d.message.contains("required input 'topic'"))
        .expect("contract warning");
    assert_eq!(warning.location.file.to_str(), Some("investigate.quire"));
    assert_eq!(
        warning.related.as_ref().and_then(|l| l.file.to_str()),
        Some("researcher.quire")
    );
    let md = content(&output, "commands/investigate.md");
    assert!(md.contains("subagent_type=\"researcher\""));
    assert!(md.contains("prompt=\"<depth>\n2\n</depth>\""));
    assert!(md.contains("Store the result in `$REPORT`."));
}

#[test]
fn test_strict_contracts_suppress_output() {
    let options = CompileOptions::default().strict_contracts(true);
    let output = build_with(options, &[("researcher.quire", RESEARCHER), ("investigate.quire", SPAWNER)]);
    assert!(output.has_errors());
    assert!(output.artifact("commands/investigate.md").is_none());
    assert!(output.artifact("agents/researcher.md").is_some());
}

#[test]
fn test_structural_errors_do_not_stop_siblings() {
    let stray = r#"<Command name="stray" description="Stray"><li>a</li></Command>"#;
    let unknown = r#"<Command name="unknown" description="Unknown"><Widget /></Command>"#;
    let missing = r#"<Command name="missing"><p>x</p></Command>"#;
    let output = build(&[
        ("deploy.quire", DEPLOY),
        ("missing.quire", missing),
        ("stray.quire", stray),
        ("unknown.quire", unknown),
    ]);
    let errors = errors(&output);
    assert_eq!(errors.len(), 3, "{:?}", errors);
    assert!(errors[0].contains("missing required attribute 'description' on <Command>"));
    assert!(errors[1].contains("expected <ul> or <ol> around <li>, found <Command>"));
    assert!(errors[2].contains("unknown element <Widget>"));
    assert_eq!(output.artifacts.len(), 1);
    assert!(output.artifact("commands/deploy.md").is_some());
}

#[test]
fn test_list_child_must_be_li() {
    let source = r#"<Command name="bad" description="Bad"><ul><p>x</p></ul></Command>"#;
    let output = build(&[("bad.quire", source)]);
    assert!(errors(&output)[0].contains("expected <li> inside <ul>, found <p>"));
}

#[test]
fn test_unsupported_expression_is_an_error() {
    let source = r#"<Command name="count" description="Count">
  <Variable name="ctx" />
  <If condition={ctx.count > 3}><p>Many.</p></If>
</Command>"#;
    let output = build(&[("count.quire", source)]);
    let errors = errors(&output);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("count.quire:3:"));
    assert!(errors[0].contains("unsupported runtime expression"));
}

#[test]
fn test_unknown_call_target_fails_document() {
    let source = r#"<Command name="calls" description="Calls"><Call fn="nowhere" /></Command>"#;
    let output = build(&[("calls.quire", source)]);
    assert!(errors(&output)[0].contains("unknown function 'nowhere'"));
    assert!(output.artifact("commands/calls.md").is_none());
}

#[test]
fn test_loop_exit_from_break_condition() {
    let source = r#"<RuntimeCommand name="retry" description="Retry">
  <Variable name="result" />
  <Function name="attempt">return { done: true };</Function>
  <Loop max={3} counter="attempt_no">
    <Call fn="attempt" output="result" />
    <If condition={result.done == true}>
      <Break message="Finished." />
    </If>
  </Loop>
</RuntimeCommand>"#;
    let output = build(&[("retry.quire", source)]);
    assert!(errors(&output).is_empty(), "{:?}", output.diagnostics);
    let md = content(&output, "commands/retry.md");
    assert!(md.contains("**Loop (max 3 iterations, counter `attempt_no`):**"));
    assert!(md.contains("**Break out of the loop:** Finished."));
    assert!(md.contains("**Exit the loop when** result.done equals true."));
}

#[test]
fn test_two_breaks_in_one_loop() {
    let source = r#"<Command name="loops" description="Loops">
  <Loop max={2}><Break /><Break /></Loop>
</Command>"#;
    let output = build(&[("loops.quire", source)]);
    assert!(errors(&output)[0].contains("<Loop> may contain at most one <Break>, found 2"));
}

#[test]
fn test_state_and_orchestrator() {
    let source = r#"<State name="build" description="Build progress.">
  <Field name="status" type="string" default="PENDING" />
  <Operation name="read" />
  <Operation name="setStatus" kind="write" field="status" description="Record the status" />
</State>"#;
    let output = build(&[("build.state.quire", source)]);
    assert!(errors(&output).is_empty(), "{:?}", output.diagnostics);
    assert!(content(&output, "state/build.read.md").contains("sqlite3 -json \"$DB\""));
    assert!(content(&output, "state/build.setStatus.md").contains("description: Record the status\n"));
    assert!(content(&output, "state/ORCHESTRATOR.md").contains("| read | read | build.read.md |"));
}

#[test]
fn test_mcp_config_and_skill() {
    let mcp = r#"<MCPConfig name="tools" description="Tools">
  <Server name="files" command="npx" args={["-y", "fs-server"]} />
  <Server name="search" url="https://example.test/sse" type="sse" />
</MCPConfig>"#;
    let skill = r#"<Skill name="review" description="Review code" allowedTools="Read Grep">
  <p>Review carefully.</p>
  <SkillFile path="reference/checklist.md"><ul><li>Tests</li></ul></SkillFile>
  <SkillStatic src="assets/logo.png" />
</Skill>"#;
    let output = build(&[("skills/review.quire", skill), ("tools.quire", mcp)]);
    assert!(errors(&output).is_empty(), "{:?}", output.diagnostics);

    let json: serde_json::Value = serde_json::from_str(content(&output, "mcp/tools.mcp.json")).unwrap();
    assert_eq!(json["mcpServers"]["search"]["type"], "sse");

    assert!(content(&output, "skills/review/SKILL.md").contains("allowed-tools:\n- Read\n- Grep\n"));
    assert_eq!(content(&output, "skills/review/reference/checklist.md"), "- Tests\n");
    match output.artifact("skills/review/logo.png") {
        Some(quire_compiler::Artifact::Copy { from, .. }) => {
            assert_eq!(from, &std::path::PathBuf::from("skills/assets/logo.png"))
        }
        other => panic!("expected copy artifact, got {:?}", other),
    }
}

#[test]
fn test_code_split_chunks() {
    let other = CHECK.replace("name=\"check\"", "name=\"recheck\"");
    let options = CompileOptions::default().bundle(BundleStrategy::CodeSplit);
    let output = build_with(options, &[("check.quire", CHECK), ("recheck.quire", &other)]);
    assert!(content(&output, "runtime/chunks/common.js").contains("export async function checkStatus"));
    assert!(content(&output, "runtime/runtime.js").contains("import { checkStatus } from './chunks/common.js';"));
}

#[test]
fn test_duplicate_output_paths() {
    let a = r#"<Command name="same" description="A" />"#;
    let b = r#"<Command name="same" description="B" />"#;
    let output = build(&[("a.quire", a), ("b.quire", b)]);
    assert_eq!(errors(&output).len(), 2);
    assert!(output.artifacts.is_empty());
}

#[test]
fn test_else_without_if() {
    let source = r#"<Command name="orphan" description="Orphan">
  <Variable name="ctx" />
  <p>Start.</p>
  <Else><p>Never.</p></Else>
</Command>"#;
    let output = build(&[("orphan.quire", source)]);
    let errors = errors(&output);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("orphan.quire:4:"));
    assert!(errors[0].contains("<Else> must immediately follow an <If>"));
    assert!(output.artifact("commands/orphan.md").is_none());
}

#[test]
fn test_break_outside_loop() {
    let source = r#"<Command name="stray" description="Stray">
  <Break />
</Command>"#;
    let output = build(&[("stray.quire", source)]);
    assert!(errors(&output)[0].contains("<Break> is only valid inside a <Loop>"));
    assert!(output.artifact("commands/stray.md").is_none());
}

#[test]
fn test_logical_and_ternary_lower_to_jq() {
    let source = r#"<RuntimeCommand name="gate" description="Gate">
  <Variable name="ctx" />
  <p>Mode: {ctx.fast ? "quick" : "full"}</p>
  <If condition={ctx.branch == "main" && ctx.status != "FAILED"}>
    <p>Deploy.</p>
  </If>
</RuntimeCommand>"#;
    let output = build(&[("gate.quire", source)]);
    assert!(errors(&output).is_empty(), "{:?}", output.diagnostics);
    let md = content(&output, "commands/gate.md");
    assert!(md.contains(r#"Mode: `if $CTX.fast then "quick" else "full" end`"#));
    assert!(md.contains("**If ctx.branch equals 'main' AND ctx.status does not equal 'FAILED':**"));
    assert!(md.contains(r#"'($CTX.branch == "main") and ($CTX.status != "FAILED")'"#));
}

#[test]
fn test_spawn_prompt_expressions_are_checked() {
    let source = r#"<RuntimeCommand name="delegate" description="Delegate">
  <Variable name="ctx" />
  <SpawnAgent agent="researcher" description="Research">Use {nope.deep} here</SpawnAgent>
  <p><code>{alsoNope.x}</code></p>
</RuntimeCommand>"#;
    let output = build(&[("delegate.quire", source)]);
    let errors = errors(&output);
    assert!(!errors.is_empty());
    assert!(errors[0].starts_with("delegate.quire:3:"));
    assert!(errors[0].contains("nope"));
    assert!(output.artifact("commands/delegate.md").is_none());

    let inline_code = r#"<RuntimeCommand name="code" description="Code">
  <Variable name="ctx" />
  <p>Value: <code>{alsoNope.x}</code></p>
</RuntimeCommand>"#;
    let output = build(&[("code.quire", inline_code)]);
    assert!(crate::errors(&output)[0].contains("alsoNope"));
}

#[test]
fn test_spawn_prompt_renders_filters_and_rejects_markup() {
    let source = r#"<RuntimeCommand name="delegate" description="Delegate">
  <Variable name="ctx" />
  <SpawnAgent agent="researcher" description="Research">Research {ctx.topic} now</SpawnAgent>
</RuntimeCommand>"#;
    let output = build(&[("delegate.quire", source)]);
    assert!(errors(&output).is_empty(), "{:?}", output.diagnostics);
    assert!(content(&output, "commands/delegate.md").contains("prompt=\"Research `$CTX.topic` now\""));

    let markup = r#"<RuntimeCommand name="delegate" description="Delegate">
  <SpawnAgent agent="researcher" description="Research">Use <b>bold</b> here</SpawnAgent>
</RuntimeCommand>"#;
    let output = build(&[("delegate.quire", markup)]);
    assert!(errors(&output)[0].contains("expected prompt text inside <SpawnAgent>, found <b>"));
}

#[test]
fn test_break_in_nested_if_uses_every_condition() {
    let source = r#"<RuntimeCommand name="nested" description="Nested">
  <Variable name="a" />
  <Variable name="b" />
  <Loop max={5}>
    <If condition={a.ok}>
      <If condition={b.ok}>
        <Break />
      </If>
    </If>
  </Loop>
</RuntimeCommand>"#;
    let output = build(&[("nested.quire", source)]);
    assert!(errors(&output).is_empty(), "{:?}", output.diagnostics);
    assert!(content(&output, "commands/nested.md").contains("**Exit the loop when** a.ok AND b.ok."));

    let in_else = r#"<RuntimeCommand name="nested" description="Nested">
  <Variable name="a" />
  <Variable name="b" />
  <Loop max={5}>
    <If condition={a.ok}>
      <If condition={b.ok}><p>Keep going.</p></If>
      <Else><Break /></Else>
    </If>
  </Loop>
</RuntimeCommand>"#;
    let output = build(&[("nested.quire", in_else)]);
    assert!(errors(&output).is_empty(), "{:?}", output.diagnostics);
    assert!(content(&output, "commands/nested.md").contains("**Exit the loop when** a.ok AND NOT (b.ok)."));
}

#[test]
fn test_reserved_function_id() {
    let source = r#"<RuntimeCommand name="entry" description="Entry">
  <Function name="main">return 1;</Function>
</RuntimeCommand>"#;
    let output = build(&[("entry.quire", source)]);
    let errors = errors(&output);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("entry.quire:2:"));
    assert!(errors[0].contains("function name 'main' is reserved"));
    assert!(output.artifact("runtime/runtime.js").is_none());
}

#[test]
fn test_conflicting_helpers_are_errors() {
    let first = r#"<RuntimeCommand name="one" description="One">
  <Helper name="fmt">function fmt(x) { return x; }</Helper>
</RuntimeCommand>"#;
    let second = r#"<RuntimeCommand name="two" description="Two">
  <Helper name="fmt">function fmt(x) { return String(x); }</Helper>
</RuntimeCommand>"#;
    let output = build(&[("one.quire", first), ("two.quire", second)]);
    let errors = errors(&output);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("two.quire:2:"));
    assert!(errors[0].contains("helper 'fmt' conflicts"));
}

#[test]
fn test_code_block_whitespace_is_kept() {
    let source = "<Command name=\"code\" description=\"Code\">\n  <CodeBlock lang=\"bash\">\n    set -e\n\n      make  all\n  </CodeBlock>\n</Command>";
    let output = build(&[("code.quire", source)]);
    assert!(errors(&output).is_empty(), "{:?}", output.diagnostics);
    assert!(content(&output, "commands/code.md").contains("```bash\nset -e\n\n  make  all\n```"));
}
