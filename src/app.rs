//! Application assembly - explicit registration and router construction
//!
//! Components and their targets are registered exactly once, during
//! application assembly, through explicit builders; nothing registers itself
//! as a side effect of being defined. `App::finish` is the freeze point: it
//! validates every declaration against the convertor registry (so a target
//! referencing an unregistered type aborts startup instead of failing on its
//! first request), compiles the route templates, and hands everything to the
//! external router. After that the registries are read-only shared state and
//! requests touch nothing else in common.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::routing::on;
use axum::Router;
use bytes::Bytes;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::component::{Component, Extensions, RenderContext};
use crate::convert::{BoxedValue, Convertor, ConvertorRegistry};
use crate::dispatch::{dispatch, Args, BodyDecoder, BoxedHandler, Outcome, TargetRuntime};
use crate::error::Error;
use crate::path;
use crate::target::{ParamKind, ParamSpec, TargetSpec, Verb};

/// Frozen per-process state shared by every route after `finish`.
pub(crate) struct CoreState {
    pub(crate) convertors: ConvertorRegistry,
    pub(crate) targets: HashMap<(&'static str, String), TargetSpec>,
    pub(crate) extensions: Extensions,
}

/// What kind of route a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Explicit top-level document route.
    Index,
    /// Compiled target route.
    Target,
}

/// One registered route, kept for logging and introspection.
#[derive(Debug, Clone)]
pub struct RouteRecord {
    pub kind: RouteKind,
    /// `Class::method` for targets, `Class::index` for index routes.
    pub name: String,
    pub verb: Verb,
    /// Canonical grammar with `{name:type}` placeholders.
    pub grammar: String,
    /// The path as registered with the router.
    pub route: String,
}

type RouteInstaller = Box<dyn FnOnce(Arc<CoreState>, Router) -> Router + Send>;

/// The registrar. Collects convertors, extensions, components, and targets,
/// then compiles everything into an `axum::Router`.
pub struct App {
    convertors: ConvertorRegistry,
    targets: HashMap<(&'static str, String), TargetSpec>,
    extensions: Extensions,
    routes: Vec<RouteRecord>,
    installers: Vec<RouteInstaller>,
    field_types: Vec<(&'static str, &'static str)>,
}

impl App {
    /// A registrar preloaded with the built-in wire grammar.
    pub fn new() -> Self {
        App {
            convertors: ConvertorRegistry::with_builtins(),
            targets: HashMap::new(),
            extensions: Extensions::default(),
            routes: Vec::new(),
            installers: Vec::new(),
            field_types: Vec::new(),
        }
    }

    /// Register a convertor for a host type name. Must happen before
    /// `finish`; the registry is read-only afterwards.
    pub fn convertor(&mut self, type_name: impl Into<String>, convertor: Convertor) -> &mut Self {
        self.convertors.register(type_name, convertor);
        self
    }

    /// Register a render dependency, retrievable from any
    /// [`RenderContext`](crate::component::RenderContext) via `extension`.
    pub fn extension<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.extensions.insert(value);
        self
    }

    /// Begin registering a component class.
    pub fn component<C: Component>(&mut self) -> ComponentBuilder<'_, C> {
        let descriptor = C::descriptor();
        for field in descriptor.fields {
            self.field_types.push((descriptor.class_name, field.type_name));
        }
        ComponentBuilder {
            app: self,
            _component: PhantomData,
        }
    }

    /// The routes compiled so far.
    pub fn routes(&self) -> &[RouteRecord] {
        &self.routes
    }

    /// Validate every declaration, freeze the registries, and build the
    /// router. Errors here are programmer errors and should abort startup.
    pub fn finish(self) -> Result<Router, Error> {
        let App {
            convertors,
            targets,
            extensions,
            routes,
            installers,
            field_types,
        } = self;

        for spec in targets.values() {
            for param in &spec.params {
                if !convertors.contains(&param.type_name) {
                    tracing::error!(
                        component = spec.component,
                        method = %spec.name,
                        param = %param.name,
                        "target parameter references an unregistered type"
                    );
                    return Err(Error::UnknownType(param.type_name.clone()));
                }
            }
        }
        for (class_name, type_name) in &field_types {
            if !convertors.contains(type_name) {
                tracing::error!(
                    component = %class_name,
                    "component field references an unregistered type"
                );
                return Err(Error::UnknownType((*type_name).to_string()));
            }
        }

        let mut seen_routes = HashSet::new();
        let mut seen_targets = HashSet::new();
        for record in &routes {
            if !seen_routes.insert((record.route.clone(), record.verb)) {
                return Err(Error::Configuration(format!(
                    "duplicate route `{}` for {}",
                    record.route, record.verb
                )));
            }
            if record.kind == RouteKind::Target && !seen_targets.insert(record.name.clone()) {
                return Err(Error::Configuration(format!(
                    "target `{}` is registered twice",
                    record.name
                )));
            }
            tracing::debug!(verb = %record.verb, route = %record.grammar, name = %record.name, "route compiled");
        }

        let core = Arc::new(CoreState {
            convertors,
            targets,
            extensions,
        });
        let mut router = Router::new();
        for install in installers {
            router = install(core.clone(), router);
        }

        tracing::info!(routes = routes.len(), "component routes registered");
        Ok(router)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder scoped to one component class.
pub struct ComponentBuilder<'a, C: Component> {
    app: &'a mut App,
    _component: PhantomData<C>,
}

impl<'a, C: Component> ComponentBuilder<'a, C> {
    /// Register an explicit GET route that renders a factory-built instance
    /// as a full document. Several index routes per component are fine.
    pub fn index<F>(self, route_path: &str, factory: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        let descriptor = C::descriptor();
        let route_path = route_path.to_string();
        self.app.routes.push(RouteRecord {
            kind: RouteKind::Index,
            name: format!("{}::index", descriptor.class_name),
            verb: Verb::Get,
            grammar: route_path.clone(),
            route: route_path.clone(),
        });

        let factory = Arc::new(factory);
        self.app
            .installers
            .push(Box::new(move |core: Arc<CoreState>, router: Router| {
                let handler = move || {
                    let core = core.clone();
                    let factory = factory.clone();
                    async move {
                        let ctx = RenderContext::new(core);
                        let instance = factory();
                        match crate::component::render_component(&instance, &ctx).await {
                            Ok(html) => C::build_response(html),
                            Err(err) => axum::response::IntoResponse::into_response(err),
                        }
                    }
                };
                router.route(&route_path, axum::routing::get(handler))
            }));
        self
    }

    /// Begin registering a target method for this component.
    pub fn target(self, name: &str, verb: Verb) -> TargetBuilder<'a, C> {
        TargetBuilder {
            builder: self,
            spec: TargetSpec {
                component: C::descriptor().class_name,
                name: name.to_string(),
                verb,
                params: Vec::new(),
                has_body: false,
            },
        }
    }
}

/// Builder for one target: declares its parameters, then takes the handler.
pub struct TargetBuilder<'a, C: Component> {
    builder: ComponentBuilder<'a, C>,
    spec: TargetSpec,
}

impl<'a, C: Component> TargetBuilder<'a, C> {
    /// Declare a required parameter; rides as an ordered path segment.
    pub fn required(mut self, name: &str, type_name: &str) -> Self {
        self.spec.params.push(ParamSpec {
            name: name.to_string(),
            type_name: type_name.to_string(),
            kind: ParamKind::Required,
        });
        self
    }

    /// Declare a defaulted parameter; rides as a prefixed query entry. The
    /// default is given in wire encoding.
    pub fn optional(mut self, name: &str, type_name: &str, default: &str) -> Self {
        self.spec.params.push(ParamSpec {
            name: name.to_string(),
            type_name: type_name.to_string(),
            kind: ParamKind::Optional {
                default: default.to_string(),
            },
        });
        self
    }

    /// Attach the handler for a target without a body payload and finish
    /// this target's registration.
    pub fn handler<F, Fut>(self, handler: F) -> ComponentBuilder<'a, C>
    where
        F: Fn(C, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome<C>, Error>> + Send + 'static,
    {
        let boxed: BoxedHandler<C> = Arc::new(
            move |instance: C,
                  _payload: Option<BoxedValue>,
                  args: Args|
                  -> BoxFuture<'static, Result<Outcome<C>, Error>> {
                Box::pin(handler(instance, args))
            },
        );
        self.install(None, boxed)
    }

    /// Attach the handler for a target that declares a form payload type.
    /// The payload is `None` when the request body is empty.
    pub fn payload_handler<P, F, Fut>(mut self, handler: F) -> ComponentBuilder<'a, C>
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(C, Option<P>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome<C>, Error>> + Send + 'static,
    {
        self.spec.has_body = true;
        let decoder: BodyDecoder = Arc::new(|raw: &[u8]| {
            serde_urlencoded::from_bytes::<P>(raw)
                .map(|payload| Box::new(payload) as BoxedValue)
                .map_err(|e| Error::Validation(format!("cannot decode form body: {e}")))
        });
        let boxed: BoxedHandler<C> = Arc::new(
            move |instance: C,
                  payload: Option<BoxedValue>,
                  args: Args|
                  -> BoxFuture<'static, Result<Outcome<C>, Error>> {
                let payload =
                    payload.and_then(|value| value.downcast::<P>().ok().map(|boxed| *boxed));
                Box::pin(handler(instance, payload, args))
            },
        );
        self.install(Some(decoder), boxed)
    }

    fn install(
        self,
        body_decoder: Option<BodyDecoder>,
        handler: BoxedHandler<C>,
    ) -> ComponentBuilder<'a, C> {
        let TargetBuilder { builder, spec } = self;
        let descriptor = C::descriptor();
        let template = path::target_template(&descriptor, &spec);
        let route_path = template.route_path();

        builder.app.routes.push(RouteRecord {
            kind: RouteKind::Target,
            name: format!("{}::{}", descriptor.class_name, spec.name),
            verb: spec.verb,
            grammar: template.to_string(),
            route: route_path.clone(),
        });
        builder
            .app
            .targets
            .insert((descriptor.class_name, spec.name.clone()), spec.clone());

        let filter = spec.verb.method_filter();
        builder
            .app
            .installers
            .push(Box::new(move |core: Arc<CoreState>, router: Router| {
                let runtime = Arc::new(TargetRuntime {
                    spec,
                    handler,
                    body_decoder,
                    core,
                });
                let route_handler =
                    move |Path(path_params): Path<HashMap<String, String>>,
                          Query(query_params): Query<HashMap<String, String>>,
                          body: Bytes| {
                        let runtime = runtime.clone();
                        async move { dispatch(runtime, path_params, query_params, body).await }
                    };
                router.route(&route_path, on(filter, route_handler))
            }));
        builder
    }
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, router: Router) -> Result<(), Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}

/// Bind and serve until the shutdown signal fires, then finish in-flight
/// requests and return.
pub async fn serve_until(
    addr: SocketAddr,
    router: Router,
    shutdown: oneshot::Receiver<()>,
) -> Result<(), Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await.ok();
        })
        .await?;
    tracing::info!("server shut down gracefully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentDescriptor, ComponentId, FieldValues};
    use crate::element::Element;
    use async_trait::async_trait;

    struct Probe {
        id: ComponentId,
    }

    #[async_trait]
    impl Component for Probe {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor {
                class_name: "Probe",
                fields: &[],
            }
        }

        fn restore(id: ComponentId, _fields: FieldValues) -> Result<Self, Error> {
            Ok(Probe { id })
        }

        fn id(&self) -> &ComponentId {
            &self.id
        }

        async fn render(&self, _ctx: &RenderContext) -> Result<Element, Error> {
            Ok(Element::div().text("probe"))
        }
    }

    #[test]
    fn test_route_records_are_compiled_at_registration() {
        let mut app = App::new();
        app.component::<Probe>()
            .target("ping", Verb::Get)
            .required("n", "int")
            .handler(|probe: Probe, _args: Args| async move { Ok(Outcome::View(probe)) });

        let records = app.routes();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Probe::ping");
        assert_eq!(records[0].grammar, "/Probe/{id:str}/ping/{ping__n:int}");
        assert_eq!(records[0].route, "/Probe/:id/ping/:ping__n");
        assert!(app.finish().is_ok());
    }

    #[test]
    fn test_finish_rejects_unregistered_parameter_type() {
        let mut app = App::new();
        app.component::<Probe>()
            .target("ping", Verb::Get)
            .required("n", "duration")
            .handler(|probe: Probe, _args: Args| async move { Ok(Outcome::View(probe)) });

        assert!(matches!(app.finish(), Err(Error::UnknownType(name)) if name == "duration"));
    }

    #[test]
    fn test_finish_rejects_duplicate_targets() {
        let mut app = App::new();
        app.component::<Probe>()
            .target("ping", Verb::Get)
            .handler(|probe: Probe, _args: Args| async move { Ok(Outcome::View(probe)) })
            .target("ping", Verb::Get)
            .handler(|probe: Probe, _args: Args| async move { Ok(Outcome::View(probe)) });

        assert!(matches!(app.finish(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_multiple_targets_per_component() {
        let mut app = App::new();
        app.component::<Probe>()
            .target("ping", Verb::Get)
            .handler(|probe: Probe, _args: Args| async move { Ok(Outcome::View(probe)) })
            .target("reset", Verb::Post)
            .handler(|probe: Probe, _args: Args| async move { Ok(Outcome::View(probe)) });

        assert_eq!(app.routes().len(), 2);
        assert!(app.finish().is_ok());
    }
}
