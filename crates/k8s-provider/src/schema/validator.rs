use std::fmt::Display;

use k8s_provider_shared::time::Duration;
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::validation;

/// Checks a configured value beyond its type.
///
/// Messages follow the wording of the Terraform plugin framework validators, so that they read
/// naturally after the attribute path, e.g. `Attribute spec.platform value must be one of: ...`.
#[derive(Clone, Debug)]
pub enum Validator {
    /// The string must match the expression.
    Regex(Regex),

    /// The string must be one of the given values.
    OneOf(Vec<String>),

    /// The integer must lie in the inclusive range. Either side may be open.
    Int64Range { min: Option<i64>, max: Option<i64> },

    /// The string must parse as a human-readable duration, e.g. `30s` or `1m30s`.
    Duration,

    /// The string must be a lowercase RFC 1123 subdomain, like most Kubernetes object names.
    DnsSubdomain,

    /// The string must be a lowercase RFC 1123 label, like Kubernetes namespace names.
    DnsLabel,

    /// Every key of the map must be a valid label key.
    LabelKeys,

    /// Every value of the map must be a valid label value.
    LabelValues,

    /// Every key of the map must be a valid annotation key, and the annotations must not exceed
    /// the total size limit.
    AnnotationKeys,
}

impl Validator {
    /// Compiles a regex validator.
    ///
    /// Patterns are part of the static schema declaration, so failing to compile one is a
    /// programming error.
    pub fn regex(pattern: &str) -> Self {
        Self::Regex(Regex::new(pattern).expect("schema regex pattern must compile"))
    }

    pub fn one_of(values: &[&str]) -> Self {
        Self::OneOf(values.iter().map(|&value| value.to_owned()).collect())
    }

    /// Whether this validator checks single values. Such validators are applied to every
    /// element of list attributes.
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            Self::LabelKeys | Self::LabelValues | Self::AnnotationKeys
        )
    }

    /// Validates `value`, returning a message describing the problem if it is invalid.
    ///
    /// Values of an unexpected type are accepted, type checks happen before validators run.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (Self::Regex(regex), Value::String(s)) => {
                if regex.is_match(s) {
                    Ok(())
                } else {
                    Err(format!(
                        "value must match regular expression '{regex}', got: {s}",
                        regex = regex.as_str()
                    ))
                }
            }
            (Self::OneOf(values), Value::String(s)) => {
                if values.contains(s) {
                    Ok(())
                } else {
                    Err(format!(
                        "value must be one of: [{values}], got: {s:?}",
                        values = quoted_list(values)
                    ))
                }
            }
            (Self::Int64Range { min, max }, Value::Number(n)) => match n.as_i64() {
                Some(n) => check_range(n, *min, *max),
                None => Err(format!("value must be a whole number, got: {n}")),
            },
            (Self::Duration, Value::String(s)) => s.parse::<Duration>().map(|_| ()).map_err(|err| {
                format!("value must be a duration such as \"30s\" or \"1m30s\", got: {s:?}: {err}")
            }),
            (Self::DnsSubdomain, Value::String(s)) => validation::is_dns_1123_subdomain(s)
                .map_err(|errors| format!("value {s:?} is not a valid name: {errors}")),
            (Self::DnsLabel, Value::String(s)) => validation::is_dns_1123_label(s)
                .map_err(|errors| format!("value {s:?} is not a valid namespace: {errors}")),
            (Self::LabelKeys, Value::Object(map)) => check_keys(map, "label"),
            (Self::LabelValues, Value::Object(map)) => {
                for (key, value) in map {
                    if let Value::String(value) = value {
                        validation::is_label_value(value).map_err(|errors| {
                            format!("value {value:?} of label {key:?} is invalid: {errors}")
                        })?;
                    }
                }
                Ok(())
            }
            (Self::AnnotationKeys, Value::Object(map)) => {
                check_keys(map, "annotation")?;
                let total_size: usize = map
                    .iter()
                    .map(|(key, value)| key.len() + value.as_str().map_or(0, str::len))
                    .sum();
                if total_size > validation::TOTAL_ANNOTATION_SIZE_LIMIT {
                    return Err(format!(
                        "annotations are {total_size} bytes long but must be no more than {limit}",
                        limit = validation::TOTAL_ANNOTATION_SIZE_LIMIT
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|value| format!("{value:?}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_range<T>(value: T, min: Option<T>, max: Option<T>) -> Result<(), String>
where
    T: PartialOrd + Display + Copy,
{
    match (min, max) {
        (Some(min), Some(max)) if value < min || value > max => Err(format!(
            "value must be between {min} and {max}, got: {value}"
        )),
        (Some(min), None) if value < min => {
            Err(format!("value must be at least {min}, got: {value}"))
        }
        (None, Some(max)) if value > max => {
            Err(format!("value must be at most {max}, got: {value}"))
        }
        _ => Ok(()),
    }
}

fn check_keys(map: &Map<String, Value>, kind: &str) -> Result<(), String> {
    for key in map.keys() {
        validation::is_qualified_name(key)
            .map_err(|errors| format!("key {key:?} is not a valid {kind} key: {errors}"))?;
    }
    Ok(())
}

impl Display for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regex(regex) => write!(
                f,
                "value must match regular expression '{regex}'",
                regex = regex.as_str()
            ),
            Self::OneOf(values) => {
                write!(f, "value must be one of: [{values}]", values = quoted_list(values))
            }
            Self::Int64Range { min, max } => describe_range(f, *min, *max),
            Self::Duration => f.write_str("value must be a duration"),
            Self::DnsSubdomain => f.write_str("value must be a lowercase RFC 1123 subdomain"),
            Self::DnsLabel => f.write_str("value must be a lowercase RFC 1123 label"),
            Self::LabelKeys => f.write_str("keys must be valid label keys"),
            Self::LabelValues => f.write_str("values must be valid label values"),
            Self::AnnotationKeys => f.write_str("keys must be valid annotation keys"),
        }
    }
}

fn describe_range<T: Display>(
    f: &mut std::fmt::Formatter<'_>,
    min: Option<T>,
    max: Option<T>,
) -> std::fmt::Result {
    match (min, max) {
        (Some(min), Some(max)) => write!(f, "value must be between {min} and {max}"),
        (Some(min), None) => write!(f, "value must be at least {min}"),
        (None, Some(max)) => write!(f, "value must be at most {max}"),
        (None, None) => f.write_str("value must be a number"),
    }
}

impl Serialize for Validator {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
