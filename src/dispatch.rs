//! Parameter classification and request dispatch
//!
//! The dispatcher is the sole per-request entry point into the core. The
//! external router matches a concrete URL against a registered template and
//! hands over flat string maps of path and query parameters; everything from
//! there is a linear pipeline with no branching back:
//!
//! classify -> convert -> reconstruct -> deserialize body -> invoke ->
//! collect -> respond
//!
//! Keys prefixed with `{method}__` belong to the method call (prefix
//! stripped); all other keys belong to component construction. Path
//! parameters take precedence over query parameters on key collision.

use std::collections::HashMap;
use std::sync::Arc;

use axum::response::Response;
use bytes::Bytes;
use futures::future::BoxFuture;

use crate::component::{self, Component, ComponentDescriptor, ComponentId, FieldValues, RenderContext};
use crate::convert::{BoxedValue, ConvertorRegistry};
use crate::error::Error;
use crate::target::{ParamKind, TargetSpec};

use crate::app::CoreState;

/// Converted method arguments, keyed by parameter name. Handlers take their
/// typed values out.
#[derive(Default)]
pub struct Args {
    values: HashMap<String, BoxedValue>,
}

impl Args {
    pub(crate) fn insert(&mut self, name: String, value: BoxedValue) {
        self.values.insert(name, value);
    }

    /// Remove and downcast one converted argument.
    pub fn take<T: Send + 'static>(&mut self, name: &str) -> Result<T, Error> {
        self.values
            .remove(name)
            .ok_or_else(|| Error::Validation(format!("missing argument `{name}`")))?
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| Error::Validation(format!("argument `{name}` has an unexpected type")))
    }
}

/// What a target handler hands back for rendering.
pub enum Outcome<C> {
    /// Re-render the target's own (possibly mutated) instance.
    View(C),
    /// Render some other renderable instead.
    One(Box<dyn crate::component::Fragment>),
    /// Render several renderables, joined with a blank line.
    Many(Vec<Box<dyn crate::component::Fragment>>),
}

/// Type-erased target handler: reconstructed instance, optional decoded
/// payload, converted arguments.
pub(crate) type BoxedHandler<C> = Arc<
    dyn Fn(C, Option<BoxedValue>, Args) -> BoxFuture<'static, Result<Outcome<C>, Error>>
        + Send
        + Sync,
>;

/// Decodes a form-encoded body into the target's declared payload type.
pub(crate) type BodyDecoder = Arc<dyn Fn(&[u8]) -> Result<BoxedValue, Error> + Send + Sync>;

/// Everything one registered target route needs at request time.
pub(crate) struct TargetRuntime<C: Component> {
    pub(crate) spec: TargetSpec,
    pub(crate) handler: BoxedHandler<C>,
    pub(crate) body_decoder: Option<BodyDecoder>,
    pub(crate) core: Arc<CoreState>,
}

/// Parameters split into construction-scoped and invocation-scoped maps.
pub(crate) struct ClassifiedParams {
    pub(crate) construction: HashMap<String, String>,
    pub(crate) invocation: HashMap<String, String>,
}

/// Split path and query parameters by the `{method}__` prefix convention.
/// Path and query are classified independently and then merged, path first
/// on collision.
pub(crate) fn classify(
    method: &str,
    path_params: &HashMap<String, String>,
    query_params: &HashMap<String, String>,
) -> ClassifiedParams {
    let prefix = format!("{method}__");
    let mut construction = HashMap::new();
    let mut invocation = HashMap::new();
    // Query first, so path entries overwrite on collision.
    for source in [query_params, path_params] {
        for (key, value) in source {
            match key.strip_prefix(&prefix) {
                Some(stripped) => invocation.insert(stripped.to_string(), value.clone()),
                None => construction.insert(key.clone(), value.clone()),
            };
        }
    }
    ClassifiedParams {
        construction,
        invocation,
    }
}

/// Convert invocation-scoped wire strings into typed arguments, filling in
/// declared defaults for absent optional parameters.
pub(crate) fn convert_args(
    spec: &TargetSpec,
    wire: &HashMap<String, String>,
    convertors: &ConvertorRegistry,
) -> Result<Args, Error> {
    let mut args = Args::default();
    for param in &spec.params {
        let raw = match (wire.get(&param.name), &param.kind) {
            (Some(raw), _) => raw.as_str(),
            (None, ParamKind::Optional { default }) => default.as_str(),
            (None, ParamKind::Required) => {
                return Err(Error::Validation(format!(
                    "missing required parameter `{}` for target `{}`",
                    param.name, spec.name
                )));
            }
        };
        args.insert(param.name.clone(), convertors.parse(&param.type_name, raw)?);
    }
    Ok(args)
}

/// Convert construction-scoped wire strings into typed field values. Only
/// declared fields are converted; the id segment and any stray keys are left
/// to their own consumers.
pub(crate) fn convert_fields(
    descriptor: &ComponentDescriptor,
    wire: &HashMap<String, String>,
    convertors: &ConvertorRegistry,
) -> Result<FieldValues, Error> {
    let mut fields = FieldValues::default();
    for field in descriptor.fields {
        let raw = wire.get(field.name).ok_or_else(|| {
            Error::Validation(format!(
                "missing construction value for field `{}` of `{}`",
                field.name, descriptor.class_name
            ))
        })?;
        fields.insert(
            field.name.to_string(),
            convertors.parse(field.type_name, raw)?,
        );
    }
    Ok(fields)
}

/// Run one request through the pipeline and produce the transport response.
pub(crate) async fn dispatch<C: Component>(
    runtime: Arc<TargetRuntime<C>>,
    path_params: HashMap<String, String>,
    query_params: HashMap<String, String>,
    body: Bytes,
) -> Result<Response, Error> {
    let spec = &runtime.spec;
    tracing::debug!(
        component = spec.component,
        method = %spec.name,
        verb = %spec.verb,
        "dispatching target"
    );

    // Classify and convert.
    let params = classify(&spec.name, &path_params, &query_params);
    let args = convert_args(spec, &params.invocation, &runtime.core.convertors)?;

    // Reconstruct the instance, bypassing normal construction logic.
    let descriptor = C::descriptor();
    let key = params.construction.get("id").cloned().ok_or_else(|| {
        Error::Validation(format!(
            "route for target `{}` is missing the id segment",
            spec.name
        ))
    })?;
    let fields = convert_fields(&descriptor, &params.construction, &runtime.core.convertors)?;
    let instance = C::restore(ComponentId::restored(descriptor.class_name, key), fields)?;

    // Deserialize the body, if declared.
    let payload = decode_body(&runtime, &body)?;

    // Invoke and collect.
    let outcome = (runtime.handler)(instance, payload, args).await?;
    let ctx = RenderContext::new(runtime.core.clone());
    let html = match outcome {
        Outcome::View(instance) => component::render_component(&instance, &ctx).await?,
        Outcome::One(fragment) => fragment.fragment_html(&ctx).await?,
        Outcome::Many(fragments) => {
            let mut rendered = Vec::with_capacity(fragments.len());
            for fragment in fragments {
                rendered.push(fragment.fragment_html(&ctx).await?);
            }
            rendered.join("\n\n")
        }
    };

    Ok(C::build_response(html))
}

fn decode_body<C: Component>(
    runtime: &TargetRuntime<C>,
    body: &Bytes,
) -> Result<Option<BoxedValue>, Error> {
    if body.is_empty() {
        return Ok(None);
    }
    match &runtime.body_decoder {
        Some(decode) => decode(body).map(Some),
        None => Err(Error::Configuration(format!(
            "target `{}` received a request body but declares no payload",
            runtime.spec.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{ParamSpec, Verb};

    fn spec() -> TargetSpec {
        TargetSpec {
            component: "TestComponent",
            name: "test_target".to_string(),
            verb: Verb::Get,
            params: vec![
                ParamSpec {
                    name: "param1".to_string(),
                    type_name: "int".to_string(),
                    kind: ParamKind::Required,
                },
                ParamSpec {
                    name: "param2".to_string(),
                    type_name: "str".to_string(),
                    kind: ParamKind::Optional {
                        default: "init".to_string(),
                    },
                },
            ],
            has_body: false,
        }
    }

    fn map(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_classify_splits_by_prefix() {
        let path = map(&[("id", "1"), ("test_target__param1", "5")]);
        let query = map(&[("test_target__param2", "x"), ("other", "y")]);
        let params = classify("test_target", &path, &query);

        assert_eq!(params.construction.get("id").unwrap(), "1");
        assert_eq!(params.construction.get("other").unwrap(), "y");
        assert_eq!(params.invocation.get("param1").unwrap(), "5");
        assert_eq!(params.invocation.get("param2").unwrap(), "x");
    }

    #[test]
    fn test_classify_path_wins_on_collision() {
        let path = map(&[("test_target__param1", "from-path")]);
        let query = map(&[("test_target__param1", "from-query")]);
        let params = classify("test_target", &path, &query);
        assert_eq!(params.invocation.get("param1").unwrap(), "from-path");
    }

    #[test]
    fn test_convert_args_fills_defaults() {
        let convertors = ConvertorRegistry::with_builtins();
        let wire = map(&[("param1", "7")]);
        let mut args = convert_args(&spec(), &wire, &convertors).unwrap();
        assert_eq!(args.take::<i64>("param1").unwrap(), 7);
        assert_eq!(args.take::<String>("param2").unwrap(), "init");
    }

    #[test]
    fn test_convert_args_missing_required() {
        let convertors = ConvertorRegistry::with_builtins();
        let wire = HashMap::new();
        assert!(matches!(
            convert_args(&spec(), &wire, &convertors),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_convert_args_bad_wire_value() {
        let convertors = ConvertorRegistry::with_builtins();
        let wire = map(&[("param1", "not-a-number")]);
        assert!(matches!(
            convert_args(&spec(), &wire, &convertors),
            Err(Error::Conversion { .. })
        ));
    }
}
