//! Type conversion registry - bidirectional codecs between wire strings and
//! typed values
//!
//! Every value that travels through a path segment or query entry is encoded
//! by a convertor registered under a wire type name ("int", "str", ...). The
//! registry is populated once during application assembly and frozen behind an
//! `Arc` when the router is built; dispatch only ever reads it.
//!
//! Convertors must be exact inverses: `parse(format(v)) == v` for every valid
//! value, and `format` must be unambiguous. The string codec demonstrates why
//! that matters: a path segment cannot be literally empty, so the empty string
//! is encoded as a sentinel that is distinct from "no value".

use std::any::Any;
use std::collections::HashMap;

use crate::error::Error;

/// Sentinel encoding for the empty string. Path segments cannot be empty, so
/// `""` must round-trip through something that is.
pub const EMPTY_STRING_SENTINEL: &str = "__empty__";

/// A parsed value with its concrete type erased.
pub type BoxedValue = Box<dyn Any + Send>;

/// A bidirectional codec between a wire string and one concrete type.
pub struct Convertor {
    parse: Box<dyn Fn(&str) -> Result<BoxedValue, String> + Send + Sync>,
    format: Box<dyn Fn(&dyn Any) -> Option<String> + Send + Sync>,
}

impl Convertor {
    /// Build a convertor from a parse/format pair for a concrete type.
    ///
    /// The parse closure reports failures as plain strings; the registry
    /// attaches the wire type name when surfacing them as errors. The format
    /// closure is total: formatting can only fail if the value handed to the
    /// registry is not actually a `T`, which the registry detects itself.
    pub fn new<T, P, F>(parse: P, format: F) -> Self
    where
        T: Send + 'static,
        P: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Convertor {
            parse: Box::new(move |raw| parse(raw).map(|value| Box::new(value) as BoxedValue)),
            format: Box::new(move |any| any.downcast_ref::<T>().map(&format)),
        }
    }
}

/// Registry of convertors keyed by wire type name.
pub struct ConvertorRegistry {
    convertors: HashMap<String, Convertor>,
}

impl ConvertorRegistry {
    /// An empty registry with no codecs at all.
    pub fn empty() -> Self {
        ConvertorRegistry {
            convertors: HashMap::new(),
        }
    }

    /// The built-in wire grammar: `int`, `float`, `str`, and `bool`.
    ///
    /// `str` uses the empty-string sentinel; `bool` has exactly the two
    /// literal encodings `True` and `False`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.register(
            "int",
            Convertor::new(
                |raw| raw.parse::<i64>().map_err(|e| e.to_string()),
                |value: &i64| value.to_string(),
            ),
        );
        registry.register(
            "float",
            Convertor::new(
                |raw| raw.parse::<f64>().map_err(|e| e.to_string()),
                |value: &f64| value.to_string(),
            ),
        );
        registry.register(
            "str",
            Convertor::new(
                |raw| -> Result<String, String> {
                    if raw == EMPTY_STRING_SENTINEL {
                        Ok(String::new())
                    } else {
                        Ok(raw.to_string())
                    }
                },
                |value: &String| {
                    if value.is_empty() {
                        EMPTY_STRING_SENTINEL.to_string()
                    } else {
                        value.clone()
                    }
                },
            ),
        );
        registry.register(
            "bool",
            Convertor::new(
                |raw| match raw {
                    "True" => Ok(true),
                    "False" => Ok(false),
                    other => Err(format!("expected `True` or `False`, got `{other}`")),
                },
                |value: &bool| if *value { "True" } else { "False" }.to_string(),
            ),
        );

        registry
    }

    /// Register a convertor under a wire type name, replacing any previous
    /// registration. Must only be called during application assembly.
    pub fn register(&mut self, type_name: impl Into<String>, convertor: Convertor) {
        self.convertors.insert(type_name.into(), convertor);
    }

    /// Whether a convertor is registered under the given name.
    pub fn contains(&self, type_name: &str) -> bool {
        self.convertors.contains_key(type_name)
    }

    /// Parse a wire string into a type-erased value.
    pub fn parse(&self, type_name: &str, raw: &str) -> Result<BoxedValue, Error> {
        let convertor = self
            .convertors
            .get(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
        (convertor.parse)(raw).map_err(|detail| Error::Conversion {
            type_name: type_name.to_string(),
            detail: format!("cannot parse `{raw}`: {detail}"),
        })
    }

    /// Parse a wire string and downcast it to a concrete type.
    pub fn parse_as<T: Send + 'static>(&self, type_name: &str, raw: &str) -> Result<T, Error> {
        self.parse(type_name, raw)?
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| Error::Conversion {
                type_name: type_name.to_string(),
                detail: "parsed value does not match the requested type".to_string(),
            })
    }

    /// Format a typed value into its wire string.
    pub fn format(&self, type_name: &str, value: &dyn Any) -> Result<String, Error> {
        let convertor = self
            .convertors
            .get(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
        (convertor.format)(value).ok_or_else(|| Error::Conversion {
            type_name: type_name.to_string(),
            detail: "value does not match the registered concrete type".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_round_trip() {
        let registry = ConvertorRegistry::with_builtins();
        for value in [-42i64, 0, 7, i64::MAX] {
            let wire = registry.format("int", &value).unwrap();
            assert_eq!(registry.parse_as::<i64>("int", &wire).unwrap(), value);
        }
    }

    #[test]
    fn test_bool_has_exactly_two_encodings() {
        let registry = ConvertorRegistry::with_builtins();
        assert!(registry.parse_as::<bool>("bool", "True").unwrap());
        assert!(!registry.parse_as::<bool>("bool", "False").unwrap());
        assert_eq!(registry.format("bool", &true).unwrap(), "True");
        assert_eq!(registry.format("bool", &false).unwrap(), "False");
        assert!(registry.parse("bool", "true").is_err());
    }

    #[test]
    fn test_string_round_trip() {
        let registry = ConvertorRegistry::with_builtins();
        let wire = registry.format("str", &"test".to_string()).unwrap();
        assert_eq!(wire, "test");
        assert_eq!(registry.parse_as::<String>("str", &wire).unwrap(), "test");
    }

    #[test]
    fn test_empty_string_sentinel_is_distinct_from_absence() {
        let registry = ConvertorRegistry::with_builtins();
        let wire = registry.format("str", &String::new()).unwrap();
        assert_eq!(wire, EMPTY_STRING_SENTINEL);
        assert_eq!(registry.parse_as::<String>("str", &wire).unwrap(), "");
        // The literal sentinel also decodes to the empty string, never to
        // itself, so the encoding is unambiguous.
        assert_eq!(
            registry
                .parse_as::<String>("str", EMPTY_STRING_SENTINEL)
                .unwrap(),
            ""
        );
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let registry = ConvertorRegistry::with_builtins();
        assert!(matches!(
            registry.parse("duration", "5s"),
            Err(Error::UnknownType(name)) if name == "duration"
        ));
        assert!(matches!(
            registry.format("duration", &5i64),
            Err(Error::UnknownType(_))
        ));
    }

    #[test]
    fn test_format_rejects_mismatched_concrete_type() {
        let registry = ConvertorRegistry::with_builtins();
        assert!(matches!(
            registry.format("int", &"not an int".to_string()),
            Err(Error::Conversion { .. })
        ));
    }

    #[test]
    fn test_host_registered_convertor() {
        let mut registry = ConvertorRegistry::with_builtins();
        registry.register(
            "optional_int",
            Convertor::new(
                |raw| {
                    if raw == "None" {
                        Ok(None)
                    } else {
                        raw.parse::<i64>().map(Some).map_err(|e| e.to_string())
                    }
                },
                |value: &Option<i64>| match value {
                    Some(n) => n.to_string(),
                    None => "None".to_string(),
                },
            ),
        );
        assert_eq!(
            registry.parse_as::<Option<i64>>("optional_int", "7").unwrap(),
            Some(7)
        );
        assert_eq!(
            registry
                .parse_as::<Option<i64>>("optional_int", "None")
                .unwrap(),
            None
        );
        assert_eq!(registry.format("optional_int", &None::<i64>).unwrap(), "None");
    }
}
