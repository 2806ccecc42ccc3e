//! Conversion between Terraform-shaped values (snake_case attribute names) and Kubernetes JSON
//! (camelCase field names).

use serde_json::{Map, Value};

use crate::schema::{Attribute, AttributeType};

/// Converts a configured object into the Kubernetes JSON representation.
///
/// Unset (`null`) attributes and provider-local attributes are omitted.
pub fn to_kubernetes(attributes: &[Attribute], value: &Value) -> Value {
    let Value::Object(object) = value else {
        return value.clone();
    };

    let mut out = Map::new();
    for attribute in attributes.iter().filter(|attribute| !attribute.is_local()) {
        match object.get(&attribute.name) {
            None | Some(Value::Null) => {}
            Some(value) => {
                out.insert(
                    attribute.json_name.clone(),
                    convert(&attribute.attribute_type, value, to_kubernetes),
                );
            }
        }
    }
    Value::Object(out)
}

/// Converts Kubernetes JSON back into a Terraform-shaped object.
///
/// Fields without a declared attribute, such as defaults filled in by the API server or
/// operator, are dropped.
pub fn from_kubernetes(attributes: &[Attribute], value: &Value) -> Value {
    let Value::Object(object) = value else {
        return value.clone();
    };

    let mut out = Map::new();
    for attribute in attributes.iter().filter(|attribute| !attribute.is_local()) {
        match object.get(&attribute.json_name) {
            None | Some(Value::Null) => {}
            Some(value) => {
                out.insert(
                    attribute.name.clone(),
                    convert(&attribute.attribute_type, value, from_kubernetes),
                );
            }
        }
    }
    Value::Object(out)
}

fn convert(
    attribute_type: &AttributeType,
    value: &Value,
    convert_object: fn(&[Attribute], &Value) -> Value,
) -> Value {
    match (attribute_type, value) {
        (AttributeType::SingleNested { attributes }, _) => convert_object(attributes, value),
        (AttributeType::ListNested { attributes }, Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| convert_object(attributes, item))
                .collect(),
        ),
        // Scalars, lists and maps keep their shape
        _ => value.clone(),
    }
}
