//! Manage Couchbase Operator custom resources through Kubernetes server-side apply.
//!
//! The crate mirrors the resources of a Terraform provider: every managed object type is a
//! [`resource::Resource`] described by a [`schema::ResourceSchema`]. Plans are validated
//! against the schema, converted into Kubernetes objects and applied with a
//! [`client::DynamicClient`].
pub mod cli;
pub mod client;
pub mod couchbase;
pub mod diagnostics;
pub mod jsonpath;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod validation;
