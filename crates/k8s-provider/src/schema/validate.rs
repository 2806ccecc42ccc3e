//! Validation of configured values against the declared attributes.
//!
//! Validation never stops at the first problem. Every invalid value is reported as its own
//! [`Diagnostic`] pointing at the offending attribute.

use serde_json::{Map, Value};

use crate::{
    diagnostics::{Diagnostic, Diagnostics},
    schema::{Attribute, AttributePath, AttributeType, ElementType, Presence},
};

/// Validates an object `value` against `attributes`, appending all problems to `diagnostics`.
///
/// `path` points at the object itself and is empty for the resource root.
pub fn validate_object(
    attributes: &[Attribute],
    value: &Value,
    path: &AttributePath,
    diagnostics: &mut Diagnostics,
) {
    let Value::Object(object) = value else {
        diagnostics.push(Diagnostic::incorrect_type(path.clone(), "object"));
        return;
    };

    for key in object.keys() {
        if !attributes.iter().any(|attribute| &attribute.name == key) {
            diagnostics.push(Diagnostic::unsupported_argument(path.attribute(key)));
        }
    }

    for attribute in attributes {
        validate_attribute(attribute, object, path, diagnostics);
    }
}

fn validate_attribute(
    attribute: &Attribute,
    object: &Map<String, Value>,
    parent: &AttributePath,
    diagnostics: &mut Diagnostics,
) {
    let path = parent.attribute(&attribute.name);

    match (object.get(&attribute.name), attribute.presence) {
        (None | Some(Value::Null), Presence::Required) => {
            diagnostics.push(Diagnostic::missing_required(path));
        }
        (None | Some(Value::Null), _) => {}
        (Some(_), Presence::Computed) => diagnostics.push(Diagnostic::read_only(path)),
        (Some(value), _) => validate_value(attribute, value, &path, diagnostics),
    }
}

fn validate_value(
    attribute: &Attribute,
    value: &Value,
    path: &AttributePath,
    diagnostics: &mut Diagnostics,
) {
    match &attribute.attribute_type {
        AttributeType::String => {
            validate_scalar(attribute, ElementType::String, value, path, diagnostics);
        }
        AttributeType::Bool => {
            validate_scalar(attribute, ElementType::Bool, value, path, diagnostics);
        }
        AttributeType::Int64 => {
            validate_scalar(attribute, ElementType::Int64, value, path, diagnostics);
        }
        AttributeType::List { element } => {
            let Value::Array(items) = value else {
                diagnostics.push(Diagnostic::incorrect_type(
                    path.clone(),
                    format!("list of {element}"),
                ));
                return;
            };
            for (index, item) in items.iter().enumerate() {
                validate_scalar(attribute, *element, item, &path.index(index), diagnostics);
            }
        }
        AttributeType::Map { element } => {
            let Value::Object(entries) = value else {
                diagnostics.push(Diagnostic::incorrect_type(
                    path.clone(),
                    format!("map of {element}"),
                ));
                return;
            };
            let mut types_match = true;
            for (key, item) in entries {
                if !element_matches(*element, item) {
                    types_match = false;
                    diagnostics.push(Diagnostic::incorrect_type(path.key(key), element));
                }
            }
            if types_match {
                for validator in attribute.validators.iter().filter(|v| !v.is_scalar()) {
                    if let Err(message) = validator.validate(value) {
                        diagnostics.push(Diagnostic::invalid_value(path.clone(), message));
                    }
                }
            }
        }
        AttributeType::SingleNested { attributes } => {
            validate_object(attributes, value, path, diagnostics);
        }
        AttributeType::ListNested { attributes } => {
            let Value::Array(items) = value else {
                diagnostics.push(Diagnostic::incorrect_type(path.clone(), "list of object"));
                return;
            };
            for (index, item) in items.iter().enumerate() {
                validate_object(attributes, item, &path.index(index), diagnostics);
            }
        }
    }
}

/// Checks a single value (or a list element) against its type and the scalar validators.
fn validate_scalar(
    attribute: &Attribute,
    element: ElementType,
    value: &Value,
    path: &AttributePath,
    diagnostics: &mut Diagnostics,
) {
    if !element_matches(element, value) {
        diagnostics.push(Diagnostic::incorrect_type(path.clone(), element));
        return;
    }

    for validator in attribute.validators.iter().filter(|v| v.is_scalar()) {
        if let Err(message) = validator.validate(value) {
            diagnostics.push(Diagnostic::invalid_value(path.clone(), message));
        }
    }
}

fn element_matches(element: ElementType, value: &Value) -> bool {
    match element {
        ElementType::String => value.is_string(),
        ElementType::Bool => value.is_boolean(),
        ElementType::Int64 => value.as_i64().is_some(),
    }
}
