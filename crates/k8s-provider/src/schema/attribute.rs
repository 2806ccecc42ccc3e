use convert_case::{Case, Casing};
use serde::Serialize;

use crate::schema::validator::Validator;

/// Whether an attribute has to be, may be or must not be set in a plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Required,

    #[default]
    Optional,

    /// Set by the provider only. A plan setting it is rejected.
    Computed,

    /// Set by the provider unless configured.
    OptionalComputed,
}

/// The type of list and map elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ElementType {
    String,
    Bool,
    Int64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Bool,
    Int64,

    List {
        element: ElementType,
    },

    Map {
        element: ElementType,
    },

    SingleNested {
        attributes: Vec<Attribute>,
    },

    ListNested {
        attributes: Vec<Attribute>,
    },
}

impl AttributeType {
    /// The nested attributes of object-like types.
    pub fn attributes(&self) -> Option<&[Attribute]> {
        match self {
            Self::SingleNested { attributes } | Self::ListNested { attributes } => {
                Some(attributes)
            }
            _ => None,
        }
    }
}

/// A single attribute of the resource schema.
///
/// Every attribute knows both its Terraform name (snake_case, used in plans and state) and the
/// JSON name of the Kubernetes field it is mapped onto.
#[derive(Clone, Debug, Serialize)]
pub struct Attribute {
    pub name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub json_name: String,

    #[serde(flatten)]
    pub attribute_type: AttributeType,

    pub presence: Presence,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub requires_replace: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
}

impl Attribute {
    /// Creates an optional attribute for the Kubernetes field `json_name`.
    pub fn new(json_name: &str, attribute_type: AttributeType) -> Self {
        Self {
            name: json_name.to_case(Case::Snake),
            json_name: json_name.to_owned(),
            attribute_type,
            presence: Presence::Optional,
            requires_replace: false,
            description: None,
            validators: Vec::new(),
        }
    }

    pub fn string(json_name: &str) -> Self {
        Self::new(json_name, AttributeType::String)
    }

    pub fn bool(json_name: &str) -> Self {
        Self::new(json_name, AttributeType::Bool)
    }

    pub fn int64(json_name: &str) -> Self {
        Self::new(json_name, AttributeType::Int64)
    }

    pub fn list(json_name: &str, element: ElementType) -> Self {
        Self::new(json_name, AttributeType::List { element })
    }

    pub fn map(json_name: &str, element: ElementType) -> Self {
        Self::new(json_name, AttributeType::Map { element })
    }

    pub fn object(json_name: &str, attributes: impl IntoIterator<Item = Self>) -> Self {
        Self::new(
            json_name,
            AttributeType::SingleNested {
                attributes: attributes.into_iter().collect(),
            },
        )
    }

    pub fn list_nested(json_name: &str, attributes: impl IntoIterator<Item = Self>) -> Self {
        Self::new(
            json_name,
            AttributeType::ListNested {
                attributes: attributes.into_iter().collect(),
            },
        )
    }

    /// A provider-local attribute which has no Kubernetes counterpart.
    pub fn local(name: &str, attribute_type: AttributeType) -> Self {
        Self {
            json_name: String::new(),
            ..Self::new(name, attribute_type)
        }
    }

    /// Overrides the Terraform name derived from the JSON name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.presence = Presence::Required;
        self
    }

    pub fn computed(mut self) -> Self {
        self.presence = Presence::Computed;
        self
    }

    pub fn optional_computed(mut self) -> Self {
        self.presence = Presence::OptionalComputed;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn one_of(self, values: &[&str]) -> Self {
        self.validator(Validator::one_of(values))
    }

    pub fn regex(self, pattern: &str) -> Self {
        self.validator(Validator::regex(pattern))
    }

    pub fn int_range(self, min: impl Into<Option<i64>>, max: impl Into<Option<i64>>) -> Self {
        self.validator(Validator::Int64Range {
            min: min.into(),
            max: max.into(),
        })
    }

    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }

    /// Whether the attribute is mapped onto a Kubernetes field.
    pub fn is_local(&self) -> bool {
        self.json_name.is_empty()
    }
}

/// Looks up an attribute by its Terraform name.
pub fn find<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|attribute| attribute.name == name)
}
