/// Markdown serialization of Block and Inline IR
///
/// Blocks are separated by exactly one blank line. Nested list content is
/// indented two spaces per level. Fences and code spans grow past the longest
/// backtick run in their content.

use crate::error::Result;
use crate::ir::{Alignment, Block, Inline, List, Step, StepVariant, Table};

pub struct MarkdownRenderer<'a> {
    /// Command prefix for runtime function invocations
    pub(super) runtime_entry: &'a str,
}

impl<'a> MarkdownRenderer<'a> {
    pub fn new(runtime_entry: &'a str) -> Self {
        Self { runtime_entry }
    }

    pub fn render_blocks(&self, blocks: &[Block]) -> Result<String> {
        let mut parts = Vec::with_capacity(blocks.len());
        for block in blocks {
            let rendered = self.render_block(block)?;
            if !rendered.is_empty() {
                parts.push(rendered);
            }
        }
        Ok(parts.join("\n\n"))
    }

    pub fn render_block(&self, block: &Block) -> Result<String> {
        let text = match block {
            Block::Heading { level, content } => {
                format!("{} {}", "#".repeat((*level).clamp(1, 6) as usize), render_inlines(content))
            }
            Block::Paragraph(content) => render_inlines(content),
            Block::List(list) => self.render_list(list)?,
            Block::CodeBlock { language, code } => fenced(language.as_deref().unwrap_or(""), code),
            Block::Blockquote(children) => {
                let inner = self.render_blocks(children)?;
                inner
                    .lines()
                    .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {}", line) })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Block::ThematicBreak => "---".to_string(),
            Block::Table(table) => render_table(table),
            Block::Xml {
                tag,
                attributes,
                children,
            } => {
                let mut open = format!("<{}", tag);
                for (name, value) in attributes {
                    open.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
                }
                open.push('>');
                wrap_tag(&open, tag, &self.render_blocks(children)?)
            }
            Block::Raw(text) => text.trim_end().to_string(),
            Block::ExecutionContext(paths) => {
                let lines: Vec<String> = paths.iter().map(|p| format!("@{}", p)).collect();
                wrap_tag("<execution_context>", "execution_context", &lines.join("\n"))
            }
            Block::SuccessCriteria(criteria) => {
                let lines: Vec<String> = criteria
                    .iter()
                    .map(|c| format!("- [{}] {}", if c.checked { "x" } else { " " }, c.text))
                    .collect();
                wrap_tag("<success_criteria>", "success_criteria", &lines.join("\n"))
            }
            Block::OfferNext(routes) => {
                let lines: Vec<String> = routes
                    .iter()
                    .map(|r| match &r.description {
                        Some(description) => format!("- **{}** (`{}`): {}", r.name, r.path, description),
                        None => format!("- **{}** (`{}`)", r.name, r.path),
                    })
                    .collect();
                wrap_tag("<offer_next>", "offer_next", &lines.join("\n"))
            }
            Block::Step(step) => self.render_step(step)?,
            Block::Runtime(runtime) => self.render_runtime(runtime)?,
        };
        Ok(text)
    }

    fn render_list(&self, list: &List) -> Result<String> {
        let mut lines = Vec::new();
        for (index, item) in list.items.iter().enumerate() {
            let marker = if list.ordered {
                format!("{}.", list.start as usize + index)
            } else {
                "-".to_string()
            };
            let content = render_inlines(&item.content);
            if content.is_empty() {
                lines.push(marker);
            } else {
                lines.push(format!("{} {}", marker, indent_continuation(&content)));
            }
            for child in &item.children {
                let rendered = self.render_block(child)?;
                if !rendered.is_empty() {
                    lines.push(indent(&rendered));
                }
            }
        }
        Ok(lines.join("\n"))
    }

    fn render_step(&self, step: &Step) -> Result<String> {
        let body = self.render_blocks(&step.children)?;
        let title = format!("Step {}: {}", step.number, step.title);
        let text = match step.variant {
            StepVariant::Heading => join_nonempty(&[format!("## {}", title), body]),
            StepVariant::Bold => join_nonempty(&[format!("**{}**", title), body]),
            StepVariant::Xml => wrap_tag(
                &format!(
                    "<step number=\"{}\" name=\"{}\">",
                    step.number,
                    escape_attr(&step.title)
                ),
                "step",
                &body,
            ),
        };
        Ok(text)
    }
}

pub fn render_inlines(inlines: &[Inline]) -> String {
    inlines.iter().map(render_inline).collect()
}

fn render_inline(inline: &Inline) -> String {
    match inline {
        Inline::Text(text) => text.clone(),
        Inline::Bold(children) => format!("**{}**", render_inlines(children)),
        Inline::Italic(children) => format!("*{}*", render_inlines(children)),
        Inline::Code(code) => code_span(code),
        Inline::Link { href, children } => format!("[{}]({})", render_inlines(children), href),
    }
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Inline code with a delimiter longer than any backtick run inside
pub fn code_span(code: &str) -> String {
    let ticks = "`".repeat(longest_backtick_run(code) + 1);
    if code.starts_with('`') || code.ends_with('`') {
        format!("{} {} {}", ticks, code, ticks)
    } else {
        format!("{}{}{}", ticks, code, ticks)
    }
}

/// Fenced code block; the fence is at least three backticks and longer than
/// any run in the content
pub fn fenced(language: &str, code: &str) -> String {
    let fence = "`".repeat((longest_backtick_run(code) + 1).max(3));
    if code.is_empty() {
        format!("{}{}\n{}", fence, language, fence)
    } else {
        format!("{}{}\n{}\n{}", fence, language, code, fence)
    }
}

/// Escape a table cell so the row keeps its column count
pub fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace("\r\n", "<br>").replace('\n', "<br>")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

pub fn render_table(table: &Table) -> String {
    let row = |cells: &[String]| {
        let cells: Vec<String> = cells.iter().map(|c| escape_cell(c)).collect();
        format!("| {} |", cells.join(" | "))
    };
    let separator: Vec<&str> = (0..table.headers.len())
        .map(|i| table.align.get(i).copied().unwrap_or_default())
        .map(|a| match a {
            Alignment::None => "---",
            Alignment::Left => ":---",
            Alignment::Center => ":---:",
            Alignment::Right => "---:",
        })
        .collect();
    let mut lines = vec![row(&table.headers), format!("| {} |", separator.join(" | "))];
    lines.extend(table.rows.iter().map(|r| row(r)));
    lines.join("\n")
}

/// Indent every non-empty line by two spaces
pub fn indent(text: &str) -> String {
    text.lines()
        .map(|line| if line.is_empty() { String::new() } else { format!("  {}", line) })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indent all lines after the first, for multi-line list item content
fn indent_continuation(text: &str) -> String {
    match text.split_once('\n') {
        Some((first, rest)) => format!("{}\n{}", first, indent(rest)),
        None => text.to_string(),
    }
}

fn wrap_tag(open: &str, tag: &str, inner: &str) -> String {
    if inner.is_empty() {
        format!("{}\n</{}>", open, tag)
    } else {
        format!("{}\n{}\n</{}>", open, inner, tag)
    }
}

pub(super) fn join_nonempty(parts: &[String]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ListItem;

    fn text(s: &str) -> Vec<Inline> {
        vec![Inline::Text(s.to_string())]
    }

    fn item(s: &str, children: Vec<Block>) -> ListItem {
        ListItem {
            content: text(s),
            children,
        }
    }

    fn render(block: Block) -> String {
        MarkdownRenderer::new("node runtime.js").render_block(&block).unwrap()
    }

    #[test]
    fn test_heading_clamps() {
        assert_eq!(render(Block::Heading { level: 2, content: text("Setup") }), "## Setup");
        assert_eq!(render(Block::Heading { level: 9, content: text("Deep") }), "###### Deep");
    }

    #[test]
    fn test_nested_list_indentation() {
        let inner = Block::List(List {
            ordered: true,
            start: 1,
            items: vec![item("x", vec![])],
        });
        let outer = Block::List(List {
            ordered: false,
            start: 1,
            items: vec![item("a", vec![inner]), item("b", vec![])],
        });
        assert_eq!(render(outer), "- a\n  1. x\n- b");
    }

    #[test]
    fn test_ordered_list_start() {
        let list = Block::List(List {
            ordered: true,
            start: 3,
            items: vec![item("c", vec![]), item("d", vec![])],
        });
        assert_eq!(render(list), "3. c\n4. d");
    }

    #[test]
    fn test_table_escapes_pipes_and_newlines() {
        let table = Block::Table(Table {
            headers: vec!["Flag".into(), "Meaning".into()],
            rows: vec![vec!["a|b".into(), "line1\nline2".into()]],
            align: vec![Alignment::Left, Alignment::None],
        });
        assert_eq!(
            render(table),
            "| Flag | Meaning |\n| :--- | --- |\n| a\\|b | line1<br>line2 |"
        );
    }

    #[test]
    fn test_fence_grows_past_content() {
        assert_eq!(fenced("md", "```js\nx\n```"), "````md\n```js\nx\n```\n````");
        assert_eq!(code_span("a`b"), "``a`b``");
    }

    #[test]
    fn test_xml_wrapper_and_blockquote() {
        let xml = Block::Xml {
            tag: "objective".into(),
            attributes: vec![],
            children: vec![Block::Paragraph(text("Ship it."))],
        };
        assert_eq!(render(xml), "<objective>\nShip it.\n</objective>");
        let quote = Block::Blockquote(vec![
            Block::Paragraph(text("one")),
            Block::Paragraph(text("two")),
        ]);
        assert_eq!(render(quote), "> one\n>\n> two");
    }
}
