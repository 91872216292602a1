//! Path grammar compiler
//!
//! Two independent algorithms share one rule set. The template forms are
//! compiled once at registration and handed to the router; the instance forms
//! are compiled during render passes for concrete instances and argument
//! values. Whatever shape is produced here is exactly what dispatch parses
//! back, so both sides must stay inverses of each other.
//!
//! Grammar:
//!
//! ```text
//! /<Class>/<id>[/<field>/<value>]*            construction (base) path
//! /<method>[/<value>]*[?<method>__<p>=<v>&..] target path appended to it
//! ```
//!
//! Required parameters ride as ordered path segments; defaulted parameters
//! ride as `method__param` query entries with no trailing separator.

use std::collections::HashMap;
use std::fmt;

use crate::component::{ComponentDescriptor, ComponentId};
use crate::convert::{BoxedValue, ConvertorRegistry};
use crate::error::Error;
use crate::target::{ParamKind, TargetSpec};

/// One compiled path segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Fixed text: class name, field name, or method name.
    Literal(String),
    /// A typed placeholder filled at request time.
    Param { name: String, type_name: String },
}

/// A compiled path template, renderable as the canonical grammar or as the
/// router's registration syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The axum registration path, one `:name` capture per placeholder.
    pub fn route_path(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(literal) => out.push_str(literal),
                Segment::Param { name, .. } => {
                    out.push(':');
                    out.push_str(name);
                }
            }
        }
        out
    }
}

impl fmt::Display for PathTemplate {
    /// Canonical grammar: `/{name:type}` per placeholder.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            f.write_str("/")?;
            match segment {
                Segment::Literal(literal) => f.write_str(literal)?,
                Segment::Param { name, type_name } => write!(f, "{{{name}:{type_name}}}")?,
            }
        }
        Ok(())
    }
}

/// Compile the construction-path template for a component class:
/// `/{Class}/{id:str}` plus one `/{field}/{field:type}` pair per declared
/// field, in declaration order.
pub fn base_template(descriptor: &ComponentDescriptor) -> PathTemplate {
    let mut segments = vec![
        Segment::Literal(descriptor.class_name.to_string()),
        Segment::Param {
            name: "id".to_string(),
            type_name: "str".to_string(),
        },
    ];
    for field in descriptor.fields {
        segments.push(Segment::Literal(field.name.to_string()));
        segments.push(Segment::Param {
            name: field.name.to_string(),
            type_name: field.type_name.to_string(),
        });
    }
    PathTemplate { segments }
}

/// Compile the full route template for a target: the component's base
/// template, the method name, and one `{method__param:type}` placeholder per
/// required parameter in declaration order. Defaulted parameters arrive via
/// the query string and have no placeholder.
pub fn target_template(descriptor: &ComponentDescriptor, spec: &TargetSpec) -> PathTemplate {
    let mut template = base_template(descriptor);
    template
        .segments
        .push(Segment::Literal(spec.name.clone()));
    for param in spec.required_params() {
        template.segments.push(Segment::Param {
            name: format!("{}__{}", spec.name, param.name),
            type_name: param.type_name.clone(),
        });
    }
    template
}

/// Compile the concrete base path for an instance: identity key plus each
/// declared field's encoded value, in declaration order.
pub fn instance_base_path(
    descriptor: &ComponentDescriptor,
    id: &ComponentId,
    field_values: &[(&'static str, BoxedValue)],
    convertors: &ConvertorRegistry,
) -> Result<String, Error> {
    let mut path = format!(
        "/{}/{}",
        descriptor.class_name,
        encode_component(id.key())
    );
    for field in descriptor.fields {
        let (_, value) = field_values
            .iter()
            .find(|(name, _)| *name == field.name)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "component `{}` did not provide a value for field `{}`",
                    descriptor.class_name, field.name
                ))
            })?;
        let wire = convertors.format(field.type_name, value.as_ref())?;
        path.push('/');
        path.push_str(field.name);
        path.push('/');
        path.push_str(&encode_component(&wire));
    }
    Ok(path)
}

/// Compile the concrete target path for a call: `/method`, one encoded
/// segment per required argument in declaration order, then the query
/// component for the defaulted parameters. Every optional parameter resolves
/// to the bound argument or its declared default; the query is omitted
/// entirely when there are none, and no trailing separator is emitted.
pub fn instance_target_path(
    spec: &TargetSpec,
    args: &HashMap<String, String>,
) -> Result<String, Error> {
    let mut path = format!("/{}", spec.name);
    for param in spec.required_params() {
        let wire = args.get(&param.name).ok_or_else(|| {
            Error::Validation(format!(
                "missing required argument `{}` for target `{}`",
                param.name, spec.name
            ))
        })?;
        path.push('/');
        path.push_str(&encode_component(wire));
    }

    let mut query = Vec::new();
    for param in spec.optional_params() {
        let wire = match (args.get(&param.name), &param.kind) {
            (Some(bound), _) => bound.as_str(),
            (None, ParamKind::Optional { default }) => default.as_str(),
            // required params were consumed above
            (None, ParamKind::Required) => unreachable!(),
        };
        query.push(format!(
            "{}__{}={}",
            spec.name,
            param.name,
            encode_component(wire)
        ));
    }
    if !query.is_empty() {
        path.push('?');
        path.push_str(&query.join("&"));
    }
    Ok(path)
}

/// Percent-encode a wire value for embedding in a path segment or query
/// entry. Keeps the RFC 3986 unreserved set; the transport decodes before
/// classification, so encoded values round-trip exactly.
pub fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::FieldSpec;
    use crate::target::{ParamSpec, Verb};

    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor {
            class_name: "TestComponent",
            fields: &[],
        }
    }

    fn annotated_descriptor() -> ComponentDescriptor {
        ComponentDescriptor {
            class_name: "TestComponent",
            fields: &[FieldSpec {
                name: "test_annotation",
                type_name: "str",
            }],
        }
    }

    fn spec(params: Vec<ParamSpec>) -> TargetSpec {
        TargetSpec {
            component: "TestComponent",
            name: "test_target".to_string(),
            verb: Verb::Get,
            params,
            has_body: false,
        }
    }

    fn required(name: &str, type_name: &str) -> ParamSpec {
        ParamSpec {
            name: name.to_string(),
            type_name: type_name.to_string(),
            kind: ParamKind::Required,
        }
    }

    fn optional(name: &str, type_name: &str, default: &str) -> ParamSpec {
        ParamSpec {
            name: name.to_string(),
            type_name: type_name.to_string(),
            kind: ParamKind::Optional {
                default: default.to_string(),
            },
        }
    }

    #[test]
    fn test_base_template_grammar() {
        assert_eq!(
            base_template(&descriptor()).to_string(),
            "/TestComponent/{id:str}"
        );
        assert_eq!(
            base_template(&annotated_descriptor()).to_string(),
            "/TestComponent/{id:str}/test_annotation/{test_annotation:str}"
        );
    }

    #[test]
    fn test_target_template_with_required_params() {
        let spec = spec(vec![required("param1", "int"), required("param2", "str")]);
        let template = target_template(&descriptor(), &spec);
        assert_eq!(
            template.to_string(),
            "/TestComponent/{id:str}/test_target/{test_target__param1:int}/{test_target__param2:str}"
        );
        assert_eq!(
            template.route_path(),
            "/TestComponent/:id/test_target/:test_target__param1/:test_target__param2"
        );
    }

    #[test]
    fn test_target_template_with_only_optional_params() {
        let spec = spec(vec![
            optional("param1", "int", "0"),
            optional("param2", "str", "init"),
        ]);
        let template = target_template(&descriptor(), &spec);
        assert_eq!(
            template.to_string(),
            "/TestComponent/{id:str}/test_target"
        );
    }

    #[test]
    fn test_instance_target_path_shape() {
        // N required segments, M query entries, no trailing separator.
        let spec = spec(vec![
            required("a", "int"),
            required("b", "str"),
            optional("c", "int", "0"),
            optional("d", "str", "init"),
        ]);
        let mut args = HashMap::new();
        args.insert("a".to_string(), "1".to_string());
        args.insert("b".to_string(), "two".to_string());
        args.insert("c".to_string(), "3".to_string());
        args.insert("d".to_string(), "four".to_string());

        let path = instance_target_path(&spec, &args).unwrap();
        assert_eq!(
            path,
            "/test_target/1/two?test_target__c=3&test_target__d=four"
        );
        assert_eq!(path.matches('&').count(), 1);
        assert!(!path.ends_with('&'));
        assert!(!path.ends_with('?'));
    }

    #[test]
    fn test_instance_target_path_without_optionals_has_no_query() {
        let spec = spec(vec![required("a", "int")]);
        let mut args = HashMap::new();
        args.insert("a".to_string(), "1".to_string());
        assert_eq!(instance_target_path(&spec, &args).unwrap(), "/test_target/1");
    }

    #[test]
    fn test_instance_base_path_with_fields() {
        let convertors = ConvertorRegistry::with_builtins();
        let id = ComponentId::restored("TestComponent", "1");
        let fields: Vec<(&'static str, BoxedValue)> =
            vec![("test_annotation", Box::new("note".to_string()))];
        let path =
            instance_base_path(&annotated_descriptor(), &id, &fields, &convertors).unwrap();
        assert_eq!(path, "/TestComponent/1/test_annotation/note");
    }

    #[test]
    fn test_empty_string_field_does_not_collide_with_absence() {
        let convertors = ConvertorRegistry::with_builtins();
        let id = ComponentId::restored("TestComponent", "1");
        let fields: Vec<(&'static str, BoxedValue)> =
            vec![("test_annotation", Box::new(String::new()))];
        let path =
            instance_base_path(&annotated_descriptor(), &id, &fields, &convertors).unwrap();
        assert_eq!(path, "/TestComponent/1/test_annotation/__empty__");
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let spec = spec(vec![
            required("a", "int"),
            optional("c", "int", "0"),
            optional("d", "str", "init"),
        ]);
        let mut args = HashMap::new();
        args.insert("a".to_string(), "1".to_string());
        let first = instance_target_path(&spec, &args).unwrap();
        let second = instance_target_path(&spec, &args).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_encode_component_escapes_separators() {
        assert_eq!(encode_component("a/b"), "a%2Fb");
        assert_eq!(encode_component("a&b=c"), "a%26b%3Dc");
        assert_eq!(encode_component("plain-value_1.~"), "plain-value_1.~");
    }
}
