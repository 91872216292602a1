//! overwire - server-rendered UI components whose methods double as HTTP
//! endpoints
//!
//! A component describes a unit of server-rendered UI. Its registered target
//! methods are HTTP endpoints: invoking one from inside a render pass
//! produces the hyperlink and attribute set that, when later requested,
//! reconstructs the originating component from the URL alone, runs the
//! method, and re-renders the fragment. No session store is involved;
//! component state travels entirely in the URL's path and query parameters,
//! and client-side event handling is delegated to an HTMX-compatible runtime
//! that merely reads the emitted attributes.
//!
//! The pieces, leaf to root:
//!
//! - [`convert`] - bidirectional codecs between wire strings and typed
//!   values, keyed by type name and extensible by the host.
//! - [`path`] - compiles a component's typed fields and a target's signature
//!   into a deterministic, reversible URL grammar.
//! - [`dispatch`] - reconstructs the component from a matched request,
//!   classifies and converts parameters, deserializes the body, invokes the
//!   target, and collects the rendered output.
//! - [`element`] / [`trigger`] - the attribute synthesizer that turns bound
//!   calls and trigger descriptors into the wire attributes a render tree
//!   emits.
//! - [`app`] - the explicit registrar that compiles route templates once at
//!   startup and hands them to the external `axum` router.
//!
//! ```no_run
//! use async_trait::async_trait;
//! use overwire::{
//!     App, Args, Component, ComponentDescriptor, ComponentId, Element, Error, FieldValues,
//!     Outcome, RenderContext, Verb,
//! };
//!
//! struct Counter {
//!     id: ComponentId,
//!     count: i64,
//! }
//!
//! #[async_trait]
//! impl Component for Counter {
//!     fn descriptor() -> ComponentDescriptor {
//!         ComponentDescriptor {
//!             class_name: "Counter",
//!             fields: &[overwire::FieldSpec { name: "count", type_name: "int" }],
//!         }
//!     }
//!
//!     fn restore(id: ComponentId, mut fields: FieldValues) -> Result<Self, Error> {
//!         Ok(Counter { id, count: fields.take("count")? })
//!     }
//!
//!     fn id(&self) -> &ComponentId {
//!         &self.id
//!     }
//!
//!     fn field_values(&self) -> Vec<(&'static str, overwire::BoxedValue)> {
//!         vec![("count", Box::new(self.count))]
//!     }
//!
//!     async fn render(&self, ctx: &RenderContext) -> Result<Element, Error> {
//!         let bump = ctx.call(self, "increment")?.arg("amount", 1i64)?.build()?;
//!         Ok(Element::div()
//!             .text(format!("count: {}", self.count))
//!             .child(Element::button().text("+1").click(bump)))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let mut app = App::new();
//!     app.component::<Counter>()
//!         .target("increment", Verb::Get)
//!         .required("amount", "int")
//!         .handler(|mut counter: Counter, mut args: Args| async move {
//!             counter.count += args.take::<i64>("amount")?;
//!             Ok(Outcome::View(counter))
//!         });
//!     let router = app.finish()?;
//!     overwire::serve("127.0.0.1:8000".parse().unwrap(), router).await
//! }
//! ```

pub mod app;
pub mod component;
pub mod convert;
pub mod dispatch;
pub mod element;
pub mod error;
pub mod path;
pub mod target;
pub mod trigger;

pub use app::{serve, serve_until, App, ComponentBuilder, RouteKind, RouteRecord, TargetBuilder};
pub use component::{
    fragment, headers, Component, ComponentDescriptor, ComponentId, Extensions, FieldSpec,
    FieldValues, Fragment, RenderContext,
};
pub use convert::{BoxedValue, Convertor, ConvertorRegistry, EMPTY_STRING_SENTINEL};
pub use dispatch::{Args, Outcome};
pub use element::{Element, Swap, Tag};
pub use error::Error;
pub use target::{BoundCall, CallBuilder, ParamKind, ParamSpec, TargetSpec, Verb};
pub use trigger::{Trigger, TriggerEvent, TriggerModifier};
