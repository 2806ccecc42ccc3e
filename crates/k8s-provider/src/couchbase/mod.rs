//! Resources of the Couchbase Autonomous Operator (`couchbase.com`).
pub mod cluster_v2;
