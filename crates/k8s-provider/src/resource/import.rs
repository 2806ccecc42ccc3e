use std::{fmt::Display, str::FromStr};

use snafu::Snafu;

#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(display(
    "expected import identifier with format 'namespace/name', got {id:?}"
))]
pub struct ImportIdError {
    id: String,
}

/// Identifies an existing object to import, written as `<namespace>/<name>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportId {
    pub namespace: String,
    pub name: String,
}

impl FromStr for ImportId {
    type Err = ImportIdError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        match id.split('/').collect::<Vec<_>>().as_slice() {
            [namespace, name] if !namespace.is_empty() && !name.is_empty() => Ok(Self {
                namespace: (*namespace).to_owned(),
                name: (*name).to_owned(),
            }),
            _ => Err(ImportIdError { id: id.to_owned() }),
        }
    }
}

impl Display for ImportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
