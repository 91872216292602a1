//! Target descriptors and bound calls
//!
//! A target is a component method exposed as an HTTP endpoint: a fixed verb
//! plus a classified parameter list. Binding a target to a concrete instance
//! and concrete argument values produces a `BoundCall`, which carries the
//! fully synthesized URL and the DOM anchor of the originating instance.
//! Bound calls are created during a render pass, consumed immediately by the
//! attribute synthesizer, and never persisted.

use std::collections::HashMap;
use std::fmt;

use axum::routing::MethodFilter;

use crate::convert::ConvertorRegistry;
use crate::error::Error;
use crate::path;

/// HTTP verb a target answers to, fixed at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
            Verb::Patch => "PATCH",
        }
    }

    /// Attribute name the client runtime reads for this verb.
    pub fn hx_attr(&self) -> &'static str {
        match self {
            Verb::Get => "hx-get",
            Verb::Post => "hx-post",
            Verb::Put => "hx-put",
            Verb::Delete => "hx-delete",
            Verb::Patch => "hx-patch",
        }
    }

    pub(crate) fn method_filter(&self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Put => MethodFilter::PUT,
            Verb::Delete => MethodFilter::DELETE,
            Verb::Patch => MethodFilter::PATCH,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a parameter travels on the wire.
///
/// Classification is purely by declared kind: parameters without a default
/// ride as ordered path segments, parameters with a default ride as prefixed
/// query entries.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Required,
    Optional {
        /// Wire-encoded default, used when a call or request omits the value.
        default: String,
    },
}

/// One declared target parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub type_name: String,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub fn is_required(&self) -> bool {
        matches!(self.kind, ParamKind::Required)
    }
}

/// A registered target: owning component class, method name, verb, and the
/// classified parameter list. At most one form payload may be declared per
/// target, alongside the path/query parameters.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub component: &'static str,
    pub name: String,
    pub verb: Verb,
    pub params: Vec<ParamSpec>,
    pub has_body: bool,
}

impl TargetSpec {
    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.is_required())
    }

    pub fn optional_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| !p.is_required())
    }
}

/// A target bound to a concrete instance and concrete argument values.
///
/// `path` is the full URL (base path of the owning instance plus target
/// path); `anchor` is the instance identity the swapped fragment replaces.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundCall {
    pub verb: Verb,
    pub path: String,
    pub anchor: String,
}

/// Builder that binds argument values to a target during a render pass.
///
/// Obtained from [`RenderContext::call`](crate::component::RenderContext::call).
/// Required arguments must all be supplied; optional arguments fall back to
/// their declared defaults.
pub struct CallBuilder<'a> {
    convertors: &'a ConvertorRegistry,
    spec: &'a TargetSpec,
    base_path: String,
    anchor: String,
    args: HashMap<String, String>,
}

impl<'a> CallBuilder<'a> {
    pub(crate) fn new(
        convertors: &'a ConvertorRegistry,
        spec: &'a TargetSpec,
        base_path: String,
        anchor: String,
    ) -> Self {
        CallBuilder {
            convertors,
            spec,
            base_path,
            anchor,
            args: HashMap::new(),
        }
    }

    /// Bind one argument by name. The value's concrete type must match the
    /// convertor registered for the parameter's declared type name.
    pub fn arg<T: Send + 'static>(mut self, name: &str, value: T) -> Result<Self, Error> {
        let param = self
            .spec
            .params
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "target `{}` has no parameter `{name}`",
                    self.spec.name
                ))
            })?;
        let wire = self.convertors.format(&param.type_name, &value)?;
        self.args.insert(name.to_string(), wire);
        Ok(self)
    }

    /// Synthesize the bound call. Fails if a required argument was not bound.
    pub fn build(self) -> Result<BoundCall, Error> {
        let target_path = path::instance_target_path(self.spec, &self.args)?;
        Ok(BoundCall {
            verb: self.spec.verb,
            path: format!("{}{}", self.base_path, target_path),
            anchor: self.anchor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TargetSpec {
        TargetSpec {
            component: "Counter",
            name: "increment".to_string(),
            verb: Verb::Get,
            params: vec![
                ParamSpec {
                    name: "amount".to_string(),
                    type_name: "int".to_string(),
                    kind: ParamKind::Required,
                },
                ParamSpec {
                    name: "label".to_string(),
                    type_name: "str".to_string(),
                    kind: ParamKind::Optional {
                        default: "init".to_string(),
                    },
                },
            ],
            has_body: false,
        }
    }

    #[test]
    fn test_bound_call_path_and_anchor() {
        let convertors = ConvertorRegistry::with_builtins();
        let spec = spec();
        let call = CallBuilder::new(
            &convertors,
            &spec,
            "/Counter/1".to_string(),
            "Counter-1".to_string(),
        )
        .arg("amount", 5i64)
        .unwrap()
        .arg("label", "total".to_string())
        .unwrap()
        .build()
        .unwrap();

        assert_eq!(call.verb, Verb::Get);
        assert_eq!(call.anchor, "Counter-1");
        assert_eq!(call.path, "/Counter/1/increment/5?increment__label=total");
    }

    #[test]
    fn test_unbound_optional_uses_declared_default() {
        let convertors = ConvertorRegistry::with_builtins();
        let spec = spec();
        let call = CallBuilder::new(
            &convertors,
            &spec,
            "/Counter/1".to_string(),
            "Counter-1".to_string(),
        )
        .arg("amount", 5i64)
        .unwrap()
        .build()
        .unwrap();

        assert_eq!(call.path, "/Counter/1/increment/5?increment__label=init");
    }

    #[test]
    fn test_missing_required_argument_fails() {
        let convertors = ConvertorRegistry::with_builtins();
        let spec = spec();
        let result = CallBuilder::new(
            &convertors,
            &spec,
            "/Counter/1".to_string(),
            "Counter-1".to_string(),
        )
        .build();
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_unknown_argument_name_fails() {
        let convertors = ConvertorRegistry::with_builtins();
        let spec = spec();
        let result = CallBuilder::new(
            &convertors,
            &spec,
            "/Counter/1".to_string(),
            "Counter-1".to_string(),
        )
        .arg("nope", 1i64);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_verb_attribute_names() {
        assert_eq!(Verb::Get.hx_attr(), "hx-get");
        assert_eq!(Verb::Delete.hx_attr(), "hx-delete");
        assert_eq!(Verb::Patch.to_string(), "PATCH");
    }
}
