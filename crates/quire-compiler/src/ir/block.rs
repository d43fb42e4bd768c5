/// Block and inline content nodes
///
/// Blocks may contain inlines; inlines never contain blocks. Every node owns
/// its data, nothing points back into the source tree.

use crate::ir::runtime::RuntimeBlock;

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, content: Vec<Inline> },
    Paragraph(Vec<Inline>),
    List(List),
    CodeBlock { language: Option<String>, code: String },
    Blockquote(Vec<Block>),
    ThematicBreak,
    Table(Table),
    /// Named semantic section rendered as `<tag>...</tag>`
    Xml {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<Block>,
    },
    /// Markdown passed through verbatim
    Raw(String),
    /// `@path` references the host loads before running
    ExecutionContext(Vec<String>),
    SuccessCriteria(Vec<Criterion>),
    OfferNext(Vec<Route>),
    Step(Step),
    Runtime(RuntimeBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub ordered: bool,
    /// First number of an ordered list
    pub start: u32,
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub content: Vec<Inline>,
    /// Nested blocks (typically sub-lists), indented under the item
    pub children: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub align: Vec<Alignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    None,
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub text: String,
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub name: String,
    pub description: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepVariant {
    #[default]
    Heading,
    Bold,
    Xml,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub number: u32,
    pub title: String,
    pub variant: StepVariant,
    pub children: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Bold(Vec<Inline>),
    Italic(Vec<Inline>),
    Code(String),
    Link { href: String, children: Vec<Inline> },
}

impl Inline {
    /// Plain text of this inline with formatting removed
    pub fn plain_text(&self) -> String {
        match self {
            Inline::Text(t) | Inline::Code(t) => t.clone(),
            Inline::Bold(children) | Inline::Italic(children) | Inline::Link { children, .. } => {
                children.iter().map(Inline::plain_text).collect()
            }
        }
    }
}
