//! Generic element tree and the target/trigger attribute synthesizer
//!
//! One element type parameterized by a tag replaces a zoo of per-tag types.
//! Elements collect plain attributes plus the wire attributes that drive the
//! client runtime: which URL, verb, DOM anchor, swap strategy, and triggering
//! event a bound call uses. Serialization is async because nested components
//! may perform asynchronous work while rendering.

use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::component::{Component, Fragment, RenderContext};
use crate::error::Error;
use crate::target::BoundCall;
use crate::trigger::{Trigger, TriggerEvent};

/// How returned markup replaces existing DOM content at the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Swap {
    /// Replace the target element entirely (the default).
    #[default]
    OuterHtml,
    InnerHtml,
    AfterBegin,
    BeforeBegin,
    BeforeEnd,
    AfterEnd,
    Delete,
    None,
}

impl Swap {
    pub fn as_str(&self) -> &'static str {
        match self {
            Swap::OuterHtml => "outerHTML",
            Swap::InnerHtml => "innerHTML",
            Swap::AfterBegin => "afterbegin",
            Swap::BeforeBegin => "beforebegin",
            Swap::BeforeEnd => "beforeend",
            Swap::AfterEnd => "afterend",
            Swap::Delete => "delete",
            Swap::None => "none",
        }
    }
}

/// HTML tag. The common tags are enumerated; anything else goes through
/// `Custom`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    A,
    Body,
    Br,
    Button,
    Div,
    Form,
    H1,
    H2,
    H3,
    Head,
    Hr,
    Html,
    Img,
    Input,
    Label,
    Li,
    Link,
    Main,
    Meta,
    Nav,
    Ol,
    P,
    Script,
    Section,
    Select,
    Span,
    Strong,
    Table,
    Tbody,
    Td,
    Textarea,
    Th,
    Thead,
    Title,
    Tr,
    Ul,
    Custom(String),
}

impl Tag {
    pub fn as_str(&self) -> &str {
        match self {
            Tag::A => "a",
            Tag::Body => "body",
            Tag::Br => "br",
            Tag::Button => "button",
            Tag::Div => "div",
            Tag::Form => "form",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::Head => "head",
            Tag::Hr => "hr",
            Tag::Html => "html",
            Tag::Img => "img",
            Tag::Input => "input",
            Tag::Label => "label",
            Tag::Li => "li",
            Tag::Link => "link",
            Tag::Main => "main",
            Tag::Meta => "meta",
            Tag::Nav => "nav",
            Tag::Ol => "ol",
            Tag::P => "p",
            Tag::Script => "script",
            Tag::Section => "section",
            Tag::Select => "select",
            Tag::Span => "span",
            Tag::Strong => "strong",
            Tag::Table => "table",
            Tag::Tbody => "tbody",
            Tag::Td => "td",
            Tag::Textarea => "textarea",
            Tag::Th => "th",
            Tag::Thead => "thead",
            Tag::Title => "title",
            Tag::Tr => "tr",
            Tag::Ul => "ul",
            Tag::Custom(name) => name,
        }
    }

    /// Void tags self-close and take no children.
    pub fn is_void(&self) -> bool {
        matches!(
            self,
            Tag::Br | Tag::Hr | Tag::Img | Tag::Input | Tag::Link | Tag::Meta
        )
    }
}

/// One piece of element content.
enum Node {
    /// Text, HTML-escaped at serialization.
    Text(String),
    /// Pre-rendered markup, emitted verbatim.
    Raw(String),
    Element(Element),
    /// A nested component, rendered (async) with its own anchor id.
    Fragment(Box<dyn Fragment>),
}

/// A server-rendered element.
pub struct Element {
    tag: Tag,
    nodes: Vec<Node>,
    class: Option<String>,
    attrs: Vec<(String, String)>,
    id: Option<String>,
    doctype: bool,
    swap: Swap,
    target: Option<BoundCall>,
    triggers: Vec<Trigger>,
    push_url: Option<String>,
    confirm: Option<String>,
    boost: bool,
    swap_oob: bool,
    on: Option<String>,
    indicator: bool,
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Element {
            tag,
            nodes: Vec::new(),
            class: None,
            attrs: Vec::new(),
            id: None,
            doctype: false,
            swap: Swap::default(),
            target: None,
            triggers: Vec::new(),
            push_url: None,
            confirm: None,
            boost: false,
            swap_oob: false,
            on: None,
            indicator: false,
        }
    }

    pub fn a() -> Self {
        Self::new(Tag::A)
    }

    pub fn body() -> Self {
        Self::new(Tag::Body)
    }

    pub fn button() -> Self {
        Self::new(Tag::Button)
    }

    pub fn div() -> Self {
        Self::new(Tag::Div)
    }

    pub fn form() -> Self {
        Self::new(Tag::Form)
    }

    pub fn head() -> Self {
        Self::new(Tag::Head)
    }

    pub fn html() -> Self {
        Self::new(Tag::Html)
    }

    pub fn input() -> Self {
        Self::new(Tag::Input)
    }

    pub fn li() -> Self {
        Self::new(Tag::Li)
    }

    pub fn script() -> Self {
        Self::new(Tag::Script)
    }

    pub fn span() -> Self {
        Self::new(Tag::Span)
    }

    pub fn textarea() -> Self {
        Self::new(Tag::Textarea)
    }

    pub fn title() -> Self {
        Self::new(Tag::Title)
    }

    pub fn ul() -> Self {
        Self::new(Tag::Ul)
    }

    /// Append escaped text content.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.nodes.push(Node::Text(text.into()));
        self
    }

    /// Append pre-rendered markup without escaping.
    pub fn raw(mut self, markup: impl Into<String>) -> Self {
        self.nodes.push(Node::Raw(markup.into()));
        self
    }

    /// Append a child element.
    pub fn child(mut self, element: Element) -> Self {
        self.nodes.push(Node::Element(element));
        self
    }

    /// Append a nested component; it renders with its own anchor id.
    pub fn component<C: Component>(mut self, component: C) -> Self {
        self.nodes
            .push(Node::Fragment(crate::component::fragment(component)));
        self
    }

    /// Set a plain attribute. Attributes render in insertion order.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Prepend the doctype declaration when serializing; for `html` roots
    /// served from index routes.
    pub fn doctype(mut self) -> Self {
        self.doctype = true;
        self
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    pub fn swap(mut self, swap: Swap) -> Self {
        self.swap = swap;
        self
    }

    /// Point this element at a bound call.
    pub fn target(mut self, call: BoundCall) -> Self {
        self.target = Some(call);
        self
    }

    /// Append a trigger; multiple triggers join with `", "`.
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    pub fn push_url(mut self, url: impl Into<String>) -> Self {
        self.push_url = Some(url.into());
        self
    }

    pub fn confirm(mut self, prompt: impl Into<String>) -> Self {
        self.confirm = Some(prompt.into());
        self
    }

    pub fn boost(mut self) -> Self {
        self.boost = true;
        self
    }

    pub fn swap_oob(mut self) -> Self {
        self.swap_oob = true;
        self
    }

    /// Inline event handler attribute.
    pub fn on(mut self, handler: impl Into<String>) -> Self {
        self.on = Some(handler.into());
        self
    }

    /// Toggle the busy-indicator class on this element.
    pub fn indicator(mut self) -> Self {
        self.indicator = true;
        self
    }

    fn bind(mut self, event: TriggerEvent, call: BoundCall) -> Self {
        self.target = Some(call);
        self.triggers = vec![Trigger::new(event)];
        self
    }

    /// Target + click trigger in one step. Like the other convenience
    /// combinators, the last-applied binding wins.
    pub fn click(self, call: BoundCall) -> Self {
        self.bind(TriggerEvent::Click, call)
    }

    pub fn submit(self, call: BoundCall) -> Self {
        self.bind(TriggerEvent::Submit, call)
    }

    pub fn change(self, call: BoundCall) -> Self {
        self.bind(TriggerEvent::Change, call)
    }

    pub fn mouse_over(self, call: BoundCall) -> Self {
        self.bind(TriggerEvent::MouseOver, call)
    }

    pub fn mouse_enter(self, call: BoundCall) -> Self {
        self.bind(TriggerEvent::MouseEnter, call)
    }

    pub fn load(self, call: BoundCall) -> Self {
        self.bind(TriggerEvent::Load, call)
    }

    pub fn intersect(self, call: BoundCall) -> Self {
        self.bind(TriggerEvent::Intersect, call)
    }

    pub fn revealed(self, call: BoundCall) -> Self {
        self.bind(TriggerEvent::Revealed, call)
    }

    /// The flat attribute set in emission order: class, plain attributes,
    /// id, then the wire attributes.
    fn assembled_attrs(&self) -> Vec<(String, String)> {
        let mut attrs = Vec::new();

        let mut class = self.class.clone().unwrap_or_default();
        if self.indicator {
            if !class.is_empty() {
                class.push(' ');
            }
            class.push_str("htmx-indicator");
        }
        if !class.is_empty() {
            attrs.push(("class".to_string(), class));
        }

        attrs.extend(self.attrs.iter().cloned());

        if let Some(id) = &self.id {
            attrs.push(("id".to_string(), id.clone()));
        }

        if let Some(call) = &self.target {
            attrs.push(("hx-swap".to_string(), self.swap.as_str().to_string()));
            attrs.push(("hx-target".to_string(), format!("#{}", call.anchor)));
            attrs.push((call.verb.hx_attr().to_string(), call.path.clone()));
        }
        if let Some(url) = &self.push_url {
            attrs.push(("hx-push-url".to_string(), url.clone()));
        }
        if !self.triggers.is_empty() {
            let joined = self
                .triggers
                .iter()
                .map(Trigger::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            attrs.push(("hx-trigger".to_string(), joined));
        }
        if self.swap_oob {
            attrs.push(("hx-swap-oob".to_string(), "true".to_string()));
        }
        if let Some(prompt) = &self.confirm {
            attrs.push(("hx-confirm".to_string(), prompt.clone()));
        }
        if self.boost {
            attrs.push(("hx-boost".to_string(), "true".to_string()));
        }
        if let Some(handler) = &self.on {
            attrs.push(("hx-on".to_string(), handler.clone()));
        }

        attrs
    }

    /// Serialize to markup. Nested components render through the context.
    pub async fn render_html(&self, ctx: &RenderContext) -> Result<String, Error> {
        self.render_boxed(ctx).await
    }

    fn render_boxed<'a>(&'a self, ctx: &'a RenderContext) -> BoxFuture<'a, Result<String, Error>> {
        Box::pin(async move {
            let mut out = String::new();
            if self.doctype {
                out.push_str("<!DOCTYPE html>");
            }
            out.push('<');
            out.push_str(self.tag.as_str());
            for (name, value) in self.assembled_attrs() {
                out.push(' ');
                out.push_str(&name);
                out.push_str("=\"");
                out.push_str(&escape_html(&value));
                out.push('"');
            }
            if self.tag.is_void() {
                out.push_str("/>");
                return Ok(out);
            }
            out.push('>');
            for node in &self.nodes {
                match node {
                    Node::Text(text) => out.push_str(&escape_html(text)),
                    Node::Raw(markup) => out.push_str(markup),
                    Node::Element(element) => out.push_str(&element.render_boxed(ctx).await?),
                    Node::Fragment(fragment) => out.push_str(&fragment.fragment_html(ctx).await?),
                }
            }
            out.push_str("</");
            out.push_str(self.tag.as_str());
            out.push('>');
            Ok(out)
        })
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag)
            .field("id", &self.id)
            .field("children", &self.nodes.len())
            .finish()
    }
}

#[async_trait]
impl Fragment for Element {
    async fn fragment_html(&self, ctx: &RenderContext) -> Result<String, Error> {
        self.render_html(ctx).await
    }
}

/// Escape text for element content and attribute values.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}
