/// Generic block and inline lowering, and the presentation components

use super::Lowerer;
use super::attrs::literal_value;
use super::runtime::RUNTIME_HANDLERS;
use super::text::{code_text, collapse_whitespace, dedent, normalize_inlines, normalize_text};
use crate::error::Result;
use crate::ir::{
    Alignment, Block, Criterion, Inline, List, ListItem, Route, Step, StepVariant, Table,
};
use quire_parser::{AttrValue, Element, EmbeddedExpr, ExprKind, Node};
use serde_json::Value;

pub(super) type BlockHandler = fn(&mut Lowerer<'_>, &Element) -> Result<Vec<Block>>;
type InlineHandler = fn(&mut Lowerer<'_>, &Element) -> Result<Inline>;

const BLOCK_HANDLERS: &[(&str, BlockHandler)] = &[
    ("h1", heading),
    ("h2", heading),
    ("h3", heading),
    ("h4", heading),
    ("h5", heading),
    ("h6", heading),
    ("Heading", heading),
    ("p", paragraph),
    ("ul", list),
    ("ol", list),
    ("blockquote", blockquote),
    ("hr", thematic_break),
    ("CodeBlock", code_block),
    ("pre", code_block),
    ("Table", table),
    ("Markdown", markdown),
    ("div", group),
    ("Group", group),
    ("XmlBlock", xml_block),
    ("ExecutionContext", execution_context),
    ("SuccessCriteria", success_criteria),
    ("OfferNext", offer_next),
    ("Step", step),
];

const INLINE_HANDLERS: &[(&str, InlineHandler)] = &[
    ("b", bold),
    ("strong", bold),
    ("i", italic),
    ("em", italic),
    ("code", inline_code),
    ("a", link),
    ("br", line_break),
];

/// Children only valid directly under a particular root
const ROOT_CHILDREN: &[(&str, &str)] = &[
    ("Input", "Agent"),
    ("SkillFile", "Skill"),
    ("SkillStatic", "Skill"),
    ("Server", "MCPConfig"),
    ("Field", "State"),
    ("Operation", "State"),
];

fn is_inline_tag(name: &str) -> bool {
    INLINE_HANDLERS.iter().any(|(tag, _)| *tag == name)
}

fn is_inline_node(node: &Node) -> bool {
    match node {
        Node::Element(e) => is_inline_tag(&e.name),
        Node::Text(_) | Node::Expr(_) => true,
    }
}

impl Lowerer<'_> {
    /// Lower every child of `parent` as blocks
    pub(super) fn lower_children(&mut self, parent: &Element) -> Result<Vec<Block>> {
        let nodes: Vec<&Node> = parent.children.iter().collect();
        self.parents.push(parent.name.clone());
        let result = self.lower_nodes(&nodes);
        self.parents.pop();
        result
    }

    /// Lower a sibling sequence. Consecutive inline nodes form paragraphs;
    /// an `If` absorbs the `Else` that follows it.
    pub(super) fn lower_nodes(&mut self, nodes: &[&Node]) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut run: Vec<&Node> = Vec::new();
        let mut i = 0;
        while i < nodes.len() {
            let node = nodes[i];
            match node {
                Node::Element(element) if !is_inline_tag(&element.name) => {
                    self.flush_run(&mut run, &mut blocks)?;
                    match element.name.as_str() {
                        "If" => {
                            let mut j = i + 1;
                            while j < nodes.len() && nodes[j].is_blank_text() {
                                j += 1;
                            }
                            let else_branch = match nodes.get(j) {
                                Some(Node::Element(next)) if next.name == "Else" => {
                                    i = j;
                                    Some(next)
                                }
                                _ => None,
                            };
                            blocks.push(self.lower_if(element, else_branch)?);
                        }
                        "Else" => {
                            return Err(self.structural(
                                element.name_span,
                                "<Else> must immediately follow an <If>",
                            ));
                        }
                        _ => blocks.extend(self.lower_block_element(element)?),
                    }
                }
                _ => run.push(node),
            }
            i += 1;
        }
        self.flush_run(&mut run, &mut blocks)?;
        Ok(blocks)
    }

    fn flush_run(&mut self, run: &mut Vec<&Node>, blocks: &mut Vec<Block>) -> Result<()> {
        if run.is_empty() {
            return Ok(());
        }
        let inlines = normalize_inlines(self.lower_inline_nodes(run)?);
        run.clear();
        if !inlines.is_empty() {
            blocks.push(Block::Paragraph(inlines));
        }
        Ok(())
    }

    fn lower_block_element(&mut self, element: &Element) -> Result<Vec<Block>> {
        let name = element.name.as_str();
        let handler = BLOCK_HANDLERS
            .iter()
            .chain(RUNTIME_HANDLERS.iter())
            .find(|(tag, _)| *tag == name)
            .map(|(_, handler)| *handler);
        if let Some(handler) = handler {
            return handler(self, element);
        }
        let parent = self.parents.last().cloned().unwrap_or_default();
        if name == "li" {
            return Err(self.structural(
                element.name_span,
                format!("expected <ul> or <ol> around <li>, found <{}>", parent),
            ));
        }
        if let Some((_, root)) = ROOT_CHILDREN.iter().find(|(tag, _)| *tag == name) {
            return Err(self.structural(
                element.name_span,
                format!("<{}> is only valid directly inside <{}>, found inside <{}>", name, root, parent),
            ));
        }
        Err(self.structural(element.name_span, format!("unknown element <{}>", name)))
    }

    /// Lower inline nodes without normalizing whitespace
    pub(super) fn lower_inline_nodes(&mut self, nodes: &[&Node]) -> Result<Vec<Inline>> {
        let mut out = Vec::new();
        for node in nodes {
            let inline = match node {
                Node::Text(text) => Inline::Text(collapse_whitespace(&text.value)),
                Node::Expr(expr) => self.inline_expr(expr)?,
                Node::Element(element) => {
                    let Some(handler) = INLINE_HANDLERS
                        .iter()
                        .find(|(tag, _)| *tag == element.name)
                        .map(|(_, handler)| *handler)
                    else {
                        let parent = self.parents.last().cloned().unwrap_or_default();
                        return Err(self.structural(
                            element.name_span,
                            format!("expected inline content inside <{}>, found <{}>", parent, element.name),
                        ));
                    };
                    self.parents.push(element.name.clone());
                    let inline = handler(self, element);
                    self.parents.pop();
                    inline?
                }
            };
            out.push(inline);
        }
        Ok(out)
    }

    /// Normalized inline content of an element that only holds inline nodes
    pub(super) fn inline_content(&mut self, element: &Element) -> Result<Vec<Inline>> {
        let nodes: Vec<&Node> = element.children.iter().collect();
        self.parents.push(element.name.clone());
        let inlines = self.lower_inline_nodes(&nodes);
        self.parents.pop();
        Ok(normalize_inlines(inlines?))
    }

    /// `{expr}` in text: string literals read as text; runtime documents
    /// render other expressions as their filter, inert ones as source text
    pub(super) fn inline_expr(&mut self, embedded: &EmbeddedExpr) -> Result<Inline> {
        if let Some(value) = literal_value(&embedded.expr) {
            match value {
                Value::String(s) => return Ok(Inline::Text(s)),
                Value::Number(n) => return Ok(Inline::Text(n.to_string())),
                Value::Bool(b) => return Ok(Inline::Text(b.to_string())),
                _ => {}
            }
        }
        if self.runtime {
            let expr = self.runtime_expr(&embedded.expr)?;
            Ok(Inline::Code(expr.to_filter()))
        } else {
            Ok(Inline::Text(embedded.source.trim().to_string()))
        }
    }

    /// Verbatim content of a raw-text element
    fn raw_text(&self, element: &Element) -> String {
        element
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.value.as_str()),
                _ => None,
            })
            .collect()
    }

    pub(super) fn raw_content(&self, element: &Element) -> String {
        dedent(&self.raw_text(element))
    }

    fn list_item(&mut self, item: &Element) -> Result<ListItem> {
        let split = item
            .children
            .iter()
            .position(|node| !is_inline_node(node))
            .unwrap_or(item.children.len());
        let (inline, rest) = item.children.split_at(split);
        let inline: Vec<&Node> = inline.iter().collect();
        let rest: Vec<&Node> = rest.iter().collect();

        self.parents.push(item.name.clone());
        let content = self.lower_inline_nodes(&inline).map(normalize_inlines);
        let children = content.and_then(|content| Ok((content, self.lower_nodes(&rest)?)));
        self.parents.pop();
        let (content, children) = children?;
        Ok(ListItem { content, children })
    }
}

fn heading(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let level = match element.name.strip_prefix('h') {
        Some(digit) => digit.parse::<u32>().unwrap_or(1),
        None => match lw.u32_attr(element, "level")? {
            Some(level) => level,
            None => {
                return Err(lw.structural(
                    element.name_span,
                    "missing required attribute 'level' on <Heading>",
                ));
            }
        },
    };
    let level = level.clamp(1, 6) as u8;
    let content = lw.inline_content(element)?;
    Ok(vec![Block::Heading { level, content }])
}

fn paragraph(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let content = lw.inline_content(element)?;
    if content.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Block::Paragraph(content)])
}

fn list(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let ordered = element.name == "ol";
    let start = if ordered {
        lw.u32_attr(element, "start")?.unwrap_or(1)
    } else {
        1
    };
    let mut items = Vec::new();
    for node in &element.children {
        match node {
            Node::Element(child) if child.name == "li" => {
                lw.parents.push(element.name.clone());
                let item = lw.list_item(child);
                lw.parents.pop();
                items.push(item?);
            }
            Node::Element(child) => {
                return Err(lw.structural(
                    child.name_span,
                    format!("expected <li> inside <{}>, found <{}>", element.name, child.name),
                ));
            }
            node if node.is_blank_text() => {}
            other => {
                return Err(lw.structural(
                    other.span(),
                    format!("expected <li> inside <{}>, found text", element.name),
                ));
            }
        }
    }
    Ok(vec![Block::List(List {
        ordered,
        start,
        items,
    })])
}

fn blockquote(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    Ok(vec![Block::Blockquote(lw.lower_children(element)?)])
}

fn thematic_break(_lw: &mut Lowerer<'_>, _element: &Element) -> Result<Vec<Block>> {
    Ok(vec![Block::ThematicBreak])
}

fn code_block(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let language = match lw.string_attr(element, "language")? {
        Some(lang) => Some(lang),
        None => lw.string_attr(element, "lang")?,
    };
    Ok(vec![Block::CodeBlock {
        language,
        code: code_text(&lw.raw_text(element)),
    }])
}

fn markdown(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let text = lw.raw_content(element);
    if text.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Block::Raw(text)])
}

fn table(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let headers = lw.string_list_attr(element, "headers")?;
    if headers.is_empty() {
        return Err(lw.structural(
            element.name_span,
            "missing required attribute 'headers' on <Table>",
        ));
    }
    let columns = headers.len();

    let mut rows = Vec::new();
    if let Some(attr) = element.attr("rows") {
        let value = match &attr.value {
            AttrValue::Expr(e) => literal_value(&e.expr),
            _ => None,
        };
        let Some(Value::Array(raw_rows)) = value else {
            return Err(lw.structural(
                attr.span,
                "attribute 'rows' on <Table> must be an array of rows",
            ));
        };
        for (index, raw) in raw_rows.iter().enumerate() {
            let Value::Array(cells) = raw else {
                return Err(lw.structural(
                    attr.span,
                    format!("row {} of <Table> must be an array of cells", index + 1),
                ));
            };
            if cells.len() > columns {
                return Err(lw.structural(
                    attr.span,
                    format!(
                        "row {} of <Table> has {} cells but the table has {} columns",
                        index + 1,
                        cells.len(),
                        columns
                    ),
                ));
            }
            let mut row: Vec<String> = cells.iter().map(cell_text).collect();
            row.resize(columns, String::new());
            rows.push(row);
        }
    }

    let mut align = Vec::with_capacity(columns);
    for name in lw.string_list_attr(element, "align")? {
        align.push(match name.as_str() {
            "left" => Alignment::Left,
            "center" => Alignment::Center,
            "right" => Alignment::Right,
            "none" | "" => Alignment::None,
            other => {
                return Err(lw.structural(
                    element.attr("align").map(|a| a.span).unwrap_or(element.span),
                    format!("unknown column alignment '{}'; expected left, center, right or none", other),
                ));
            }
        });
    }
    align.resize(columns, Alignment::None);

    Ok(vec![Block::Table(Table {
        headers,
        rows,
        align,
    })])
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `div`/`Group`: invisible without a name, `<name>` wrapper with one
fn group(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let children = lw.lower_children(element)?;
    match lw.string_attr(element, "name")? {
        Some(tag) => Ok(vec![Block::Xml {
            tag,
            attributes: Vec::new(),
            children,
        }]),
        None => Ok(children),
    }
}

fn xml_block(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let tag = lw.required_string(element, "name")?;
    let mut attributes = Vec::new();
    for attr in &element.attributes {
        if attr.name == "name" {
            continue;
        }
        if let Some(value) = lw.string_attr(element, &attr.name)? {
            attributes.push((attr.name.clone(), value));
        }
    }
    let children = lw.lower_children(element)?;
    Ok(vec![Block::Xml {
        tag,
        attributes,
        children,
    }])
}

fn execution_context(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let paths = lw.string_list_attr(element, "paths")?;
    if paths.is_empty() {
        return Err(lw.structural(
            element.name_span,
            "missing required attribute 'paths' on <ExecutionContext>",
        ));
    }
    Ok(vec![Block::ExecutionContext(paths)])
}

fn success_criteria(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let items = object_list(lw, element, "items")?;
    let mut criteria = Vec::with_capacity(items.len());
    for item in items {
        let criterion = match item {
            Value::String(text) => Criterion {
                text,
                checked: false,
            },
            Value::Object(map) => Criterion {
                text: map
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| lw.structural(element.span, "success criterion needs a 'text' field"))?,
                checked: map.get("checked").and_then(Value::as_bool).unwrap_or(false),
            },
            _ => {
                return Err(lw.structural(
                    element.span,
                    "success criteria must be strings or { text, checked } objects",
                ));
            }
        };
        criteria.push(criterion);
    }
    Ok(vec![Block::SuccessCriteria(criteria)])
}

fn offer_next(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let items = object_list(lw, element, "routes")?;
    let mut routes = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(map) = item else {
            return Err(lw.structural(
                element.span,
                "routes must be { name, path, description } objects",
            ));
        };
        let field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
        let (Some(name), Some(path)) = (field("name"), field("path")) else {
            return Err(lw.structural(element.span, "every route needs 'name' and 'path'"));
        };
        routes.push(Route {
            name,
            description: field("description"),
            path,
        });
    }
    Ok(vec![Block::OfferNext(routes)])
}

/// Required array-literal attribute
fn object_list(lw: &Lowerer<'_>, element: &Element, name: &str) -> Result<Vec<Value>> {
    match lw.literal_attr(element, name)? {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(lw.structural(
            element.attr(name).map(|a| a.span).unwrap_or(element.span),
            format!("attribute '{}' on <{}> must be an array", name, element.name),
        )),
        None => Err(lw.structural(
            element.name_span,
            format!("missing required attribute '{}' on <{}>", name, element.name),
        )),
    }
}

fn step(lw: &mut Lowerer<'_>, element: &Element) -> Result<Vec<Block>> {
    let title = lw.required_string(element, "name")?;
    let number = match lw.u32_attr(element, "number")? {
        Some(number) => number,
        None => lw.step_counter + 1,
    };
    lw.step_counter = number;
    let variant = match lw.string_attr(element, "variant")?.as_deref() {
        None | Some("heading") => StepVariant::Heading,
        Some("bold") => StepVariant::Bold,
        Some("xml") => StepVariant::Xml,
        Some(other) => {
            return Err(lw.structural(
                element.attr("variant").map(|a| a.span).unwrap_or(element.span),
                format!("unknown step variant '{}'; expected heading, bold or xml", other),
            ));
        }
    };
    let children = lw.lower_children(element)?;
    Ok(vec![Block::Step(Step {
        number,
        title,
        variant,
        children,
    })])
}

fn bold(lw: &mut Lowerer<'_>, element: &Element) -> Result<Inline> {
    let nodes: Vec<&Node> = element.children.iter().collect();
    Ok(Inline::Bold(lw.lower_inline_nodes(&nodes)?))
}

fn italic(lw: &mut Lowerer<'_>, element: &Element) -> Result<Inline> {
    let nodes: Vec<&Node> = element.children.iter().collect();
    Ok(Inline::Italic(lw.lower_inline_nodes(&nodes)?))
}

fn inline_code(lw: &mut Lowerer<'_>, element: &Element) -> Result<Inline> {
    let mut text = String::new();
    for node in &element.children {
        match node {
            Node::Text(t) => text.push_str(&t.value),
            Node::Expr(e) => match &e.expr.kind {
                ExprKind::String(s) => text.push_str(s),
                _ if lw.runtime => text.push_str(&lw.runtime_expr(&e.expr)?.to_filter()),
                _ => text.push_str(e.source.trim()),
            },
            Node::Element(child) => {
                return Err(lw.structural(
                    child.name_span,
                    format!("expected text inside <code>, found <{}>", child.name),
                ));
            }
        }
    }
    Ok(Inline::Code(normalize_text(&text)))
}

fn link(lw: &mut Lowerer<'_>, element: &Element) -> Result<Inline> {
    let href = lw.required_string(element, "href")?;
    let nodes: Vec<&Node> = element.children.iter().collect();
    Ok(Inline::Link {
        href,
        children: lw.lower_inline_nodes(&nodes)?,
    })
}

fn line_break(_lw: &mut Lowerer<'_>, _element: &Element) -> Result<Inline> {
    Ok(Inline::Text("\n".to_string()))
}
