//! Declarative description of managed resources.
//!
//! A [`ResourceSchema`] is a tree of [`Attribute`]s. Besides describing the resource, it
//! validates plans ([`ResourceSchema::validate`]), finds changes which force a replacement
//! ([`ResourceSchema::requires_replace`]) and maps values between the Terraform and the
//! Kubernetes naming ([`convert`]).

use serde::Serialize;
use serde_json::Value;

use crate::diagnostics::Diagnostics;

mod attribute;
pub mod convert;
pub mod fragments;
mod path;
pub mod validate;
mod validator;

pub use attribute::*;
pub use path::*;
pub use validator::*;

#[derive(Clone, Debug, Serialize)]
pub struct ResourceSchema {
    pub description: String,

    /// Bumped whenever the state layout changes.
    pub version: i64,

    pub attributes: Vec<Attribute>,
}

impl ResourceSchema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        attribute::find(&self.attributes, name)
    }

    /// The nested attributes of the top-level object attribute `name`, or an empty slice.
    pub fn nested(&self, name: &str) -> &[Attribute] {
        self.attribute(name)
            .and_then(|attribute| attribute.attribute_type.attributes())
            .unwrap_or_default()
    }

    /// Validates a complete plan, reporting every problem found.
    pub fn validate(&self, plan: &Value) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();
        validate::validate_object(
            &self.attributes,
            plan,
            &AttributePath::default(),
            &mut diagnostics,
        );
        diagnostics
    }

    /// Returns the paths of all attributes which are marked as requiring replacement and whose
    /// planned value differs from the prior state.
    pub fn requires_replace(&self, prior: &Value, planned: &Value) -> Vec<AttributePath> {
        let mut paths = Vec::new();
        collect_replacements(
            &self.attributes,
            prior,
            planned,
            &AttributePath::default(),
            &mut paths,
        );
        paths
    }
}

fn collect_replacements(
    attributes: &[Attribute],
    prior: &Value,
    planned: &Value,
    parent: &AttributePath,
    paths: &mut Vec<AttributePath>,
) {
    for attribute in attributes {
        let prior = prior.get(&attribute.name).unwrap_or(&Value::Null);
        let planned = planned.get(&attribute.name).unwrap_or(&Value::Null);
        let path = parent.attribute(&attribute.name);

        if attribute.requires_replace && prior != planned {
            paths.push(path);
        } else if let AttributeType::SingleNested { attributes } = &attribute.attribute_type {
            collect_replacements(attributes, prior, planned, &path, paths);
        }
    }
}
