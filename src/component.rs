//! Components, identity, and the render context
//!
//! A component is an ephemeral value: it lives for a single render or
//! request/response cycle and is never persisted between requests except
//! indirectly via its URL-encoded state. Its identity token is generated once
//! per instance and embedded both in the DOM anchor and in every path
//! compiled for it, which is what lets a later request reconstruct the same
//! instance without a session store.
//!
//! Registration is explicit: a component declares its class name and its
//! path-encoded fields through [`Component::descriptor`], and dispatch
//! rebuilds instances through [`Component::restore`], bypassing any normal
//! construction logic so side effects never run twice.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::{Html, IntoResponse, Response};
use uuid::Uuid;

use crate::app::CoreState;
use crate::convert::BoxedValue;
use crate::element::Element;
use crate::error::Error;
use crate::path;
use crate::target::CallBuilder;

/// Response header names consumed by the client runtime. Useful inside
/// [`Component::build_response`] overrides for redirect/refresh signaling.
pub mod headers {
    pub const HX_LOCATION: &str = "HX-Location";
    pub const HX_PUSH_URL: &str = "HX-Push-Url";
    pub const HX_REDIRECT: &str = "HX-Redirect";
    pub const HX_REFRESH: &str = "HX-Refresh";
    pub const HX_RESWAP: &str = "HX-Reswap";
    pub const HX_RETARGET: &str = "HX-Retarget";
    pub const HX_TRIGGER: &str = "HX-Trigger";
}

/// Opaque identity token: `{ClassName}-{key}`.
///
/// Fresh instances get a UUID key; reconstructed instances reuse the key from
/// the request path, so the re-rendered fragment lands on the same DOM
/// anchor the original render emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentId {
    class_name: &'static str,
    key: String,
}

impl ComponentId {
    /// A fresh identity for a newly created instance.
    pub fn fresh(class_name: &'static str) -> Self {
        ComponentId {
            class_name,
            key: Uuid::new_v4().to_string(),
        }
    }

    /// The identity recovered from a request path's id segment.
    pub fn restored(class_name: &'static str, key: impl Into<String>) -> Self {
        ComponentId {
            class_name,
            key: key.into(),
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// The key portion, as it appears in the path's id segment.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.class_name, self.key)
    }
}

/// One declared path-encoded field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub type_name: &'static str,
}

/// Static declaration of a component class: its URL namespace and its
/// ordered field list. Slice order is declaration order and fixes the path
/// segment order for good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub class_name: &'static str,
    pub fields: &'static [FieldSpec],
}

/// Converted construction-scoped values, keyed by field name. `restore`
/// implementations take their typed fields out of this set.
#[derive(Default)]
pub struct FieldValues {
    values: HashMap<String, BoxedValue>,
}

impl FieldValues {
    pub(crate) fn insert(&mut self, name: String, value: BoxedValue) {
        self.values.insert(name, value);
    }

    /// Remove and downcast one converted field value.
    pub fn take<T: Send + 'static>(&mut self, name: &str) -> Result<T, Error> {
        self.values
            .remove(name)
            .ok_or_else(|| Error::Validation(format!("missing component field `{name}`")))?
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| {
                Error::Validation(format!("component field `{name}` has an unexpected type"))
            })
    }
}

/// A unit of server-rendered UI whose registered targets double as HTTP
/// endpoints.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// The class declaration: URL namespace plus ordered typed fields.
    fn descriptor() -> ComponentDescriptor
    where
        Self: Sized;

    /// Rebuild an instance from its reconstructed identity and converted
    /// field values. This bypasses normal construction logic; dispatch calls
    /// it once per request.
    fn restore(id: ComponentId, fields: FieldValues) -> Result<Self, Error>
    where
        Self: Sized;

    /// The instance's identity token.
    fn id(&self) -> &ComponentId;

    /// Current values for the declared fields, used when compiling this
    /// instance's base path. Must cover every field in the descriptor.
    fn field_values(&self) -> Vec<(&'static str, BoxedValue)> {
        Vec::new()
    }

    /// Produce this instance's element tree.
    async fn render(&self, ctx: &RenderContext) -> Result<Element, Error>;

    /// Wrap rendered markup in the transport response. Override to attach
    /// custom status or headers (see [`headers`]).
    fn build_response(html: String) -> Response
    where
        Self: Sized,
    {
        Html(html).into_response()
    }
}

/// Anything dispatch can render to markup: a component or a raw element.
#[async_trait]
pub trait Fragment: Send + Sync {
    async fn fragment_html(&self, ctx: &RenderContext) -> Result<String, Error>;
}

struct ComponentFragment<C: Component>(C);

#[async_trait]
impl<C: Component> Fragment for ComponentFragment<C> {
    async fn fragment_html(&self, ctx: &RenderContext) -> Result<String, Error> {
        render_component(&self.0, ctx).await
    }
}

/// Box a component for use as a dispatch outcome or nested element content.
pub fn fragment<C: Component>(component: C) -> Box<dyn Fragment> {
    Box::new(ComponentFragment(component))
}

/// Render a component and stamp its DOM anchor id onto the root element.
pub(crate) async fn render_component<C: Component>(
    component: &C,
    ctx: &RenderContext,
) -> Result<String, Error> {
    let mut element = component.render(ctx).await?;
    element.set_id(component.id().to_string());
    element.render_html(ctx).await
}

/// Typemap of host-supplied render dependencies, populated during
/// application assembly and read-only afterwards.
#[derive(Default)]
pub struct Extensions {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }
}

/// Explicit context passed to every render. Carries the frozen registries
/// needed to synthesize bound calls, plus whatever dependencies the host
/// registered at assembly time.
pub struct RenderContext {
    core: Arc<CoreState>,
}

impl RenderContext {
    pub(crate) fn new(core: Arc<CoreState>) -> Self {
        RenderContext { core }
    }

    /// Look up a host dependency registered via `App::extension`.
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.core.extensions.get::<T>()
    }

    /// Begin binding a call to one of `instance`'s registered targets.
    ///
    /// Compiles the instance's base path eagerly, so the bound call carries
    /// the identity and field values the instance has right now.
    pub fn call<C: Component>(
        &self,
        instance: &C,
        method: &str,
    ) -> Result<CallBuilder<'_>, Error> {
        let descriptor = C::descriptor();
        let spec = self
            .core
            .targets
            .get(&(descriptor.class_name, method.to_string()))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "no target `{method}` registered for component `{}`",
                    descriptor.class_name
                ))
            })?;
        let base_path = path::instance_base_path(
            &descriptor,
            instance.id(),
            &instance.field_values(),
            &self.core.convertors,
        )?;
        Ok(CallBuilder::new(
            &self.core.convertors,
            spec,
            base_path,
            instance.id().to_string(),
        ))
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> RenderContext {
    use crate::convert::ConvertorRegistry;

    RenderContext::new(Arc::new(CoreState {
        convertors: ConvertorRegistry::with_builtins(),
        targets: HashMap::new(),
        extensions: Extensions::default(),
    }))
}
