/// Text normalization
///
/// Prose collapses whitespace; code keeps it. Inline runs go through three
/// passes: spaces are hoisted out of emphasis and links (Markdown does not
/// allow `** x**`), spaces across node boundaries collapse, and the edges of
/// the whole run are trimmed.

use crate::ir::Inline;

/// Collapse every whitespace run to a single space
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Collapse and trim a plain text value
pub fn normalize_text(text: &str) -> String {
    collapse_whitespace(text).trim().to_string()
}

/// Code block text. Only the markup layout is removed: the line break after
/// the opening tag, the indentation before the closing tag, and the
/// indentation the element's nesting adds to every non-blank line. Blank
/// lines and all other whitespace are preserved exactly.
pub fn code_text(text: &str) -> String {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.len() > 1 && lines[0].trim().is_empty() {
        lines.remove(0);
    }
    if lines.len() > 1 && lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let indent_of = |line: &str| line.len() - line.trim_start_matches([' ', '\t']).len();
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(*l))
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| {
            if indent_of(*l) >= indent {
                &l[indent..]
            } else {
                l.trim_start_matches([' ', '\t'])
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove leading and trailing blank lines and the indentation shared by
/// every non-blank line. Everything else is preserved exactly.
pub fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let (Some(first), Some(last)) = (first, last) else {
        return String::new();
    };
    let lines = &lines[first..=last];
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                ""
            } else {
                l.get(indent..).unwrap_or_else(|| l.trim_start())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalize an inline run built from collapsed text nodes
pub fn normalize_inlines(inlines: Vec<Inline>) -> Vec<Inline> {
    let hoisted = hoist(inlines);
    let mut last_space = true;
    let mut collapsed = collapse(hoisted, &mut last_space);
    trim_start(&mut collapsed);
    trim_end(&mut collapsed);
    prune(collapsed)
}

/// Append, merging with a preceding text node
pub fn push_inline(out: &mut Vec<Inline>, inline: Inline) {
    if let Inline::Text(text) = &inline {
        if let Some(Inline::Text(prev)) = out.last_mut() {
            prev.push_str(text);
            return;
        }
    }
    out.push(inline);
}

fn hoist(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut out = Vec::new();
    for inline in inlines {
        match inline {
            Inline::Bold(children) => wrap(&mut out, hoist(children), Inline::Bold),
            Inline::Italic(children) => wrap(&mut out, hoist(children), Inline::Italic),
            Inline::Link { href, children } => {
                wrap(&mut out, hoist(children), |children| Inline::Link { href, children })
            }
            other => push_inline(&mut out, other),
        }
    }
    out
}

fn wrap(out: &mut Vec<Inline>, mut children: Vec<Inline>, make: impl FnOnce(Vec<Inline>) -> Inline) {
    let leading = take_leading_space(&mut children);
    let trailing = take_trailing_space(&mut children);
    if leading {
        push_inline(out, Inline::Text(" ".to_string()));
    }
    if !children.is_empty() {
        out.push(make(children));
    }
    if trailing {
        push_inline(out, Inline::Text(" ".to_string()));
    }
}

fn take_leading_space(children: &mut Vec<Inline>) -> bool {
    let Some(Inline::Text(text)) = children.first_mut() else {
        return false;
    };
    if !text.starts_with(' ') {
        return false;
    }
    *text = text.trim_start_matches(' ').to_string();
    if text.is_empty() {
        children.remove(0);
    }
    true
}

fn take_trailing_space(children: &mut Vec<Inline>) -> bool {
    let Some(Inline::Text(text)) = children.last_mut() else {
        return false;
    };
    if !text.ends_with(' ') {
        return false;
    }
    *text = text.trim_end_matches(' ').to_string();
    if text.is_empty() {
        children.pop();
    }
    true
}

fn collapse(inlines: Vec<Inline>, last_space: &mut bool) -> Vec<Inline> {
    inlines
        .into_iter()
        .map(|inline| match inline {
            Inline::Text(text) => {
                let mut out = String::with_capacity(text.len());
                for c in text.chars() {
                    if c == ' ' {
                        if *last_space {
                            continue;
                        }
                        *last_space = true;
                    } else {
                        *last_space = c == '\n';
                    }
                    out.push(c);
                }
                Inline::Text(out)
            }
            Inline::Code(code) => {
                *last_space = false;
                Inline::Code(code)
            }
            Inline::Bold(children) => Inline::Bold(collapse(children, last_space)),
            Inline::Italic(children) => Inline::Italic(collapse(children, last_space)),
            Inline::Link { href, children } => Inline::Link {
                href,
                children: collapse(children, last_space),
            },
        })
        .collect()
}

fn trim_start(inlines: &mut Vec<Inline>) {
    while let Some(first) = inlines.first_mut() {
        match first {
            Inline::Text(text) => {
                *text = text.trim_start_matches([' ', '\n']).to_string();
                if text.is_empty() {
                    inlines.remove(0);
                    continue;
                }
            }
            Inline::Bold(children) | Inline::Italic(children) | Inline::Link { children, .. } => {
                trim_start(children)
            }
            Inline::Code(_) => {}
        }
        return;
    }
}

fn trim_end(inlines: &mut Vec<Inline>) {
    while let Some(last) = inlines.last_mut() {
        match last {
            Inline::Text(text) => {
                *text = text.trim_end_matches([' ', '\n']).to_string();
                if text.is_empty() {
                    inlines.pop();
                    continue;
                }
            }
            Inline::Bold(children) | Inline::Italic(children) | Inline::Link { children, .. } => {
                trim_end(children)
            }
            Inline::Code(_) => {}
        }
        return;
    }
}

/// Drop empty text and empty emphasis; links survive even when empty
fn prune(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut out = Vec::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) if text.is_empty() => {}
            Inline::Bold(children) => {
                let children = prune(children);
                if !children.is_empty() {
                    out.push(Inline::Bold(children));
                }
            }
            Inline::Italic(children) => {
                let children = prune(children);
                if !children.is_empty() {
                    out.push(Inline::Italic(children));
                }
            }
            Inline::Link { href, children } => out.push(Inline::Link {
                href,
                children: prune(children),
            }),
            other => push_inline(&mut out, other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn test_code_text_keeps_blank_edges_and_trailing_space() {
        let raw = "\n    \n    let x = 1;  \n\n      nested();\n\n  ";
        assert_eq!(code_text(raw), "\nlet x = 1;  \n\n  nested();\n");
    }

    #[test]
    fn test_code_text_single_line() {
        assert_eq!(code_text("  npm test "), "npm test ");
    }

    #[test]
    fn test_dedent_keeps_inner_blank_lines() {
        let raw = "\n    fn main() {\n\n        run();\n    }\n  ";
        assert_eq!(dedent(raw), "fn main() {\n\n    run();\n}");
    }

    #[test]
    fn test_spaces_hoisted_out_of_bold() {
        let run = vec![text("Run the"), Inline::Bold(vec![text(" checks ")]), text(" first.")];
        assert_eq!(
            normalize_inlines(run),
            vec![text("Run the "), Inline::Bold(vec![text("checks")]), text(" first.")]
        );
    }

    #[test]
    fn test_edges_trimmed_and_boundaries_collapsed() {
        let run = vec![text(" a "), Inline::Code("x".into()), text(" "), text(" b ")];
        assert_eq!(
            normalize_inlines(run),
            vec![text("a "), Inline::Code("x".into()), text(" b")]
        );
    }

    #[test]
    fn test_whitespace_only_run_is_empty() {
        assert!(normalize_inlines(vec![text(" "), Inline::Italic(vec![text(" ")])]).is_empty());
    }
}
