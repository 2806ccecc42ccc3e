// This is adapted from Kubernetes.
// See apimachinery/pkg/util/validation/validation.go and apimachinery/pkg/api/validation/objectmeta.go
// in the Kubernetes source.
//
// These checks run before a request is sent, so that an invalid plan is rejected with a pointer to
// the offending attribute instead of an opaque API server error.

use std::{fmt::Display, sync::LazyLock};

use const_format::concatcp;
use regex::Regex;
use snafu::Snafu;

const DNS_1123_LABEL_MAX_LENGTH: usize = 63;
const DNS_1123_LABEL_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";
const DNS_1123_LABEL_ERROR_MSG: &str = "a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character";

const DNS_1123_SUBDOMAIN_MAX_LENGTH: usize = 253;
const DNS_1123_SUBDOMAIN_FMT: &str =
    concatcp!(DNS_1123_LABEL_FMT, "(\\.", DNS_1123_LABEL_FMT, ")*");
const DNS_1123_SUBDOMAIN_ERROR_MSG: &str = "a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character";

const QUALIFIED_NAME_MAX_LENGTH: usize = 63;
const QUALIFIED_NAME_FMT: &str = "([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]";
const QUALIFIED_NAME_ERROR_MSG: &str = "name part must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character";

const LABEL_VALUE_MAX_LENGTH: usize = 63;
const LABEL_VALUE_ERROR_MSG: &str = "a valid label must be an empty string or consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character";

/// Total size of all annotation keys and values, see `TotalAnnotationSizeLimitB` in Kubernetes.
pub const TOTAL_ANNOTATION_SIZE_LIMIT: usize = 256 * 1024;

static DNS_1123_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{DNS_1123_LABEL_FMT}$")).expect("failed to compile RFC 1123 label regex")
});

static DNS_1123_SUBDOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{DNS_1123_SUBDOMAIN_FMT}$"))
        .expect("failed to compile RFC 1123 subdomain regex")
});

static QUALIFIED_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{QUALIFIED_NAME_FMT}$")).expect("failed to compile qualified name regex")
});

type Result<T = (), E = Errors> = std::result::Result<T, E>;

/// A collection of errors discovered during validation.
#[derive(Debug)]
pub struct Errors(Vec<Error>);

impl Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

/// A single validation error.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(transparent)]
    Regex { source: RegexError },

    #[snafu(display("input is {length} bytes long but must be no more than {max_length}"))]
    TooLong { length: usize, max_length: usize },

    #[snafu(display("prefix part {prefix:?} is invalid: {source}"))]
    InvalidPrefix { prefix: String, source: Box<Errors> },

    #[snafu(display("a qualified name must consist of an optional DNS subdomain prefix and a name, separated by a single '/'"))]
    TooManySlashes,

    #[snafu(display("prefix part must not be empty"))]
    EmptyPrefix,
}

#[derive(Debug)]
pub struct RegexError {
    /// The primary error message.
    msg: &'static str,

    /// The regex that the input must match.
    regex: &'static str,

    /// Examples of valid inputs (if non-empty).
    examples: &'static [&'static str],
}

impl Display for RegexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            msg,
            regex,
            examples,
        } = self;
        write!(f, "{msg} (")?;
        for (i, example) in examples.iter().enumerate() {
            let prefix = match i {
                0 => "e.g.",
                _ => "or",
            };
            write!(f, "{prefix} {example:?}, ")?;
        }
        write!(f, "regex used for validation is {regex:?})")
    }
}

impl std::error::Error for RegexError {}

/// Returns [`Ok`] if `value`'s length fits within `max_length`.
fn validate_str_length(value: &str, max_length: usize) -> Result<(), Error> {
    if value.len() > max_length {
        TooLongSnafu {
            length: value.len(),
            max_length,
        }
        .fail()
    } else {
        Ok(())
    }
}

/// Returns [`Ok`] if `value` matches `regex`.
fn validate_str_regex(
    value: &str,
    regex: &'static Regex,
    error_msg: &'static str,
    examples: &'static [&'static str],
) -> Result<(), Error> {
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(RegexError {
            msg: error_msg,
            regex: regex
                .as_str()
                // Clean up start/end-of-line markers
                .trim_start_matches('^')
                .trim_end_matches('$'),
            examples,
        }
        .into())
    }
}

/// Returns [`Ok`] if *all* validations are [`Ok`], otherwise returns all errors.
fn validate_all(validations: impl IntoIterator<Item = Result<(), Error>>) -> Result {
    let errors = validations
        .into_iter()
        .filter_map(std::result::Result::err)
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Errors(errors))
    }
}

/// Tests for a string that conforms to the definition of a lowercase label in DNS (RFC 1123),
/// as required for namespace names.
pub fn is_dns_1123_label(value: &str) -> Result {
    validate_all([
        validate_str_length(value, DNS_1123_LABEL_MAX_LENGTH),
        validate_str_regex(
            value,
            &DNS_1123_LABEL_REGEX,
            DNS_1123_LABEL_ERROR_MSG,
            &["my-name", "123-abc"],
        ),
    ])
}

/// Tests for a string that conforms to the definition of a lowercase subdomain in DNS
/// (RFC 1123), as required for the names of most Kubernetes objects.
pub fn is_dns_1123_subdomain(value: &str) -> Result {
    validate_all([
        validate_str_length(value, DNS_1123_SUBDOMAIN_MAX_LENGTH),
        validate_str_regex(
            value,
            &DNS_1123_SUBDOMAIN_REGEX,
            DNS_1123_SUBDOMAIN_ERROR_MSG,
            &["example.com"],
        ),
    ])
}

/// Tests for a qualified name as used for label and annotation keys: an optional DNS subdomain
/// prefix followed by `/` and a name of at most 63 characters.
pub fn is_qualified_name(value: &str) -> Result {
    let (prefix, name) = match value.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, value),
    };

    if name.contains('/') {
        return Err(Errors(vec![Error::TooManySlashes]));
    }

    let prefix_validation = match prefix {
        Some("") => Err(Error::EmptyPrefix),
        Some(prefix) => is_dns_1123_subdomain(prefix).map_err(|errors| Error::InvalidPrefix {
            prefix: prefix.to_owned(),
            source: Box::new(errors),
        }),
        None => Ok(()),
    };

    validate_all([
        prefix_validation,
        validate_str_length(name, QUALIFIED_NAME_MAX_LENGTH),
        validate_str_regex(
            name,
            &QUALIFIED_NAME_REGEX,
            QUALIFIED_NAME_ERROR_MSG,
            &["MyName", "my.name", "123-abc"],
        ),
    ])
}

/// Tests for a valid label value, which may be empty.
pub fn is_label_value(value: &str) -> Result {
    if value.is_empty() {
        return Ok(());
    }

    validate_all([
        validate_str_length(value, LABEL_VALUE_MAX_LENGTH),
        validate_str_regex(
            value,
            &QUALIFIED_NAME_REGEX,
            LABEL_VALUE_ERROR_MSG,
            &["MyValue", "my_value", "12345"],
        ),
    ])
}
