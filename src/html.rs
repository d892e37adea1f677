//! A renderer that builds a static HTML document in memory.

use crate::environment::{ColorScheme, ColorSchemeKey, EnvironmentValues};
use crate::layout::Axis;
use crate::mutation::{Element, ElementHandle, Mutation, MutationLog};
use crate::renderer::Renderer;
use crate::view::{Primitive, View, DEFAULT_STACK_SPACING};
use core::fmt;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

/// Tag, attributes, and markup of one HTML element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HtmlContent {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Markup placed before the children. Already escaped.
    pub inner_html: Option<String>,
}

impl HtmlContent {
    pub fn new(tag: impl Into<String>) -> HtmlContent {
        HtmlContent {
            tag: tag.into(),
            ..HtmlContent::default()
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> HtmlContent {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn inner_html(mut self, html: impl Into<String>) -> HtmlContent {
        self.inner_html = Some(html.into());
        self
    }
}

/// An HTML element with a mutable child list.
pub struct HtmlElement {
    content: RwLock<HtmlContent>,
    children: RwLock<Vec<ElementHandle<HtmlElement>>>,
}

impl Element for HtmlElement {
    type Content = HtmlContent;

    fn new(content: HtmlContent) -> HtmlElement {
        HtmlElement {
            content: RwLock::new(content),
            children: RwLock::new(Vec::new()),
        }
    }

    fn update(&self, content: HtmlContent) {
        *self.content.write() = content;
    }
}

impl HtmlElement {
    pub fn content(&self) -> HtmlContent {
        self.content.read().clone()
    }

    pub fn children(&self) -> Vec<ElementHandle<HtmlElement>> {
        self.children.read().clone()
    }

    /// Inserts a child, clamping the index to the current child count.
    fn insert_child(&self, index: usize, element: ElementHandle<HtmlElement>) {
        let mut children = self.children.write();
        let index = index.min(children.len());
        children.insert(index, element);
    }

    fn remove_child(&self, element: &ElementHandle<HtmlElement>) {
        self.children.write().retain(|child| !child.ptr_eq(element));
    }

    /// Returns false if `previous` is not a child.
    fn replace_child(
        &self,
        previous: &ElementHandle<HtmlElement>,
        replacement: ElementHandle<HtmlElement>,
    ) -> bool {
        let mut children = self.children.write();
        match children.iter_mut().find(|child| child.ptr_eq(previous)) {
            Some(slot) => {
                *slot = replacement;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for HtmlElement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let content = self.content.read();
        write!(f, "<{}", content.tag)?;
        for (name, value) in &content.attributes {
            write!(f, " {}=\"{}\"", name, escape(value))?;
        }
        write!(f, ">")?;
        if let Some(inner) = &content.inner_html {
            write!(f, "{}", inner)?;
        }

        let children = self.children.read();
        if !children.is_empty() {
            writeln!(f)?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                write!(f, "{}", **child)?;
            }
            writeln!(f)?;
        }
        write!(f, "</{}>", content.tag)
    }
}

impl fmt::Debug for HtmlElement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HtmlElement")
            .field("content", &*self.content.read())
            .field("children", &self.children.read().len())
            .finish()
    }
}

/// Escapes text for use in HTML markup and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Renders views into an HTML element tree rooted at `<body>`.
///
/// `Text` becomes a `<span>` and stacks become flex `<div>`s.
#[derive(Debug)]
pub struct StaticHtmlRenderer {
    root: ElementHandle<HtmlElement>,
}

impl StaticHtmlRenderer {
    pub fn new() -> StaticHtmlRenderer {
        StaticHtmlRenderer {
            root: ElementHandle::new(HtmlContent::new("body")),
        }
    }

    /// Serializes the current document.
    pub fn html(&self) -> String {
        self.root.to_string()
    }
}

impl Default for StaticHtmlRenderer {
    fn default() -> Self {
        StaticHtmlRenderer::new()
    }
}

fn stack_content(axis: Axis, spacing: f64) -> HtmlContent {
    let class = match axis {
        Axis::Horizontal => "_weft-stack _weft-hstack",
        Axis::Vertical => "_weft-stack _weft-vstack",
    };
    let content = HtmlContent::new("div").attribute("class", class);
    if spacing != DEFAULT_STACK_SPACING {
        content.attribute("style", format!("--weft-stack-gap: {}px;", spacing))
    } else {
        content
    }
}

impl Renderer for StaticHtmlRenderer {
    type Element = HtmlElement;

    fn is_primitive(&self, view: &dyn View) -> bool {
        view.primitive().is_some()
    }

    fn element_content(&self, view: &dyn View) -> HtmlContent {
        match view.primitive() {
            Some(Primitive::Text(text)) => HtmlContent::new("span").inner_html(escape(text)),
            Some(Primitive::Stack { axis, spacing }) => stack_content(axis, spacing),
            None => panic!("{} has no HTML representation", view.type_name()),
        }
    }

    fn commit(&self, mutations: MutationLog<HtmlElement>) {
        for mutation in mutations {
            match mutation {
                Mutation::Insert {
                    element,
                    parent,
                    index,
                } => parent.insert_child(index, element),
                Mutation::Remove { element, parent } => {
                    if let Some(parent) = parent {
                        parent.remove_child(&element);
                    }
                }
                Mutation::Replace {
                    parent,
                    previous,
                    replacement,
                } => {
                    if !parent.replace_child(&previous, replacement) {
                        debug!(?previous, "replace target is not attached; skipping");
                    }
                }
                Mutation::Update { element, content } => element.update(content),
            }
        }
    }

    fn root_element(&self) -> ElementHandle<HtmlElement> {
        self.root.clone()
    }

    fn default_environment(&self) -> EnvironmentValues {
        EnvironmentValues::new().with::<ColorSchemeKey>(ColorScheme::Light)
    }
}
