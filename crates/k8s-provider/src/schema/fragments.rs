//! Attribute trees for core Kubernetes types which custom resources embed, such as resource
//! requirements, affinities or label selectors.
//!
//! Each function returns a fresh attribute for the field `json_name`, so a fragment can be
//! embedded under different names.

use crate::schema::{Attribute, ElementType, Validator};

/// Matches Kubernetes quantities like `512Mi`, `0.5` or `1e3`.
pub const QUANTITY_REGEX: &str = r"^(\+|-)?(([0-9]+(\.[0-9]*)?)|(\.[0-9]+))(([KMGTPE]i)|[numkMGTPE]|([eE](\+|-)?(([0-9]+(\.[0-9]*)?)|(\.[0-9]+))))?$";

pub fn quantity(json_name: &str) -> Attribute {
    Attribute::string(json_name).regex(QUANTITY_REGEX)
}

pub fn labels(json_name: &str) -> Attribute {
    Attribute::map(json_name, ElementType::String)
        .validator(Validator::LabelKeys)
        .validator(Validator::LabelValues)
}

pub fn annotations(json_name: &str) -> Attribute {
    Attribute::map(json_name, ElementType::String).validator(Validator::AnnotationKeys)
}

/// `core/v1.ResourceRequirements`
pub fn resource_requirements(json_name: &str) -> Attribute {
    Attribute::object(
        json_name,
        [
            Attribute::list_nested("claims", [Attribute::string("name").required()]),
            Attribute::map("limits", ElementType::String)
                .description("Limits describes the maximum amount of compute resources allowed."),
            Attribute::map("requests", ElementType::String).description(
                "Requests describes the minimum amount of compute resources required.",
            ),
        ],
    )
    .description("Compute resources required by the container.")
}

/// `meta/v1.LabelSelector`
pub fn label_selector(json_name: &str) -> Attribute {
    Attribute::object(
        json_name,
        [
            Attribute::list_nested(
                "matchExpressions",
                [
                    Attribute::string("key").required(),
                    Attribute::string("operator")
                        .required()
                        .one_of(&["In", "NotIn", "Exists", "DoesNotExist"]),
                    Attribute::list("values", ElementType::String),
                ],
            ),
            labels("matchLabels"),
        ],
    )
}

/// `core/v1.Toleration` list
pub fn tolerations(json_name: &str) -> Attribute {
    Attribute::list_nested(
        json_name,
        [
            Attribute::string("effect").one_of(&["NoSchedule", "PreferNoSchedule", "NoExecute"]),
            Attribute::string("key"),
            Attribute::string("operator").one_of(&["Exists", "Equal"]),
            Attribute::int64("tolerationSeconds"),
            Attribute::string("value"),
        ],
    )
}

/// `core/v1.LocalObjectReference` list, used for image pull secrets.
pub fn local_object_references(json_name: &str) -> Attribute {
    Attribute::list_nested(json_name, [Attribute::string("name")])
}

fn node_selector_requirements(json_name: &str) -> Attribute {
    Attribute::list_nested(
        json_name,
        [
            Attribute::string("key").required(),
            Attribute::string("operator")
                .required()
                .one_of(&["In", "NotIn", "Exists", "DoesNotExist", "Gt", "Lt"]),
            Attribute::list("values", ElementType::String),
        ],
    )
}

fn node_selector_term() -> Vec<Attribute> {
    vec![
        node_selector_requirements("matchExpressions"),
        node_selector_requirements("matchFields"),
    ]
}

fn pod_affinity_term() -> Vec<Attribute> {
    vec![
        label_selector("labelSelector"),
        Attribute::list("matchLabelKeys", ElementType::String),
        Attribute::list("mismatchLabelKeys", ElementType::String),
        label_selector("namespaceSelector"),
        Attribute::list("namespaces", ElementType::String),
        Attribute::string("topologyKey").required(),
    ]
}

fn weighted_pod_affinity_terms(json_name: &str) -> Attribute {
    Attribute::list_nested(
        json_name,
        [
            Attribute::object("podAffinityTerm", pod_affinity_term()).required(),
            Attribute::int64("weight").required().int_range(1, 100),
        ],
    )
}

fn pod_affinity(json_name: &str) -> Attribute {
    Attribute::object(
        json_name,
        [
            weighted_pod_affinity_terms("preferredDuringSchedulingIgnoredDuringExecution"),
            Attribute::list_nested(
                "requiredDuringSchedulingIgnoredDuringExecution",
                pod_affinity_term(),
            ),
        ],
    )
}

/// `core/v1.Affinity`
pub fn affinity(json_name: &str) -> Attribute {
    Attribute::object(
        json_name,
        [
            Attribute::object(
                "nodeAffinity",
                [
                    Attribute::list_nested(
                        "preferredDuringSchedulingIgnoredDuringExecution",
                        [
                            Attribute::object("preference", node_selector_term()).required(),
                            Attribute::int64("weight").required().int_range(1, 100),
                        ],
                    ),
                    Attribute::object(
                        "requiredDuringSchedulingIgnoredDuringExecution",
                        [
                            Attribute::list_nested("nodeSelectorTerms", node_selector_term())
                                .required(),
                        ],
                    ),
                ],
            ),
            pod_affinity("podAffinity"),
            pod_affinity("podAntiAffinity"),
        ],
    )
}

fn key_selector(json_name: &str) -> Attribute {
    Attribute::object(
        json_name,
        [
            Attribute::string("key").required(),
            Attribute::string("name"),
            Attribute::bool("optional"),
        ],
    )
}

/// `core/v1.EnvVar` list
pub fn env_vars(json_name: &str) -> Attribute {
    Attribute::list_nested(
        json_name,
        [
            Attribute::string("name").required(),
            Attribute::string("value"),
            Attribute::object(
                "valueFrom",
                [
                    key_selector("configMapKeyRef"),
                    Attribute::object(
                        "fieldRef",
                        [
                            Attribute::string("apiVersion"),
                            Attribute::string("fieldPath").required(),
                        ],
                    ),
                    Attribute::object(
                        "resourceFieldRef",
                        [
                            Attribute::string("containerName"),
                            quantity("divisor"),
                            Attribute::string("resource").required(),
                        ],
                    ),
                    key_selector("secretKeyRef"),
                ],
            ),
        ],
    )
}

/// `core/v1.EnvFromSource` list
pub fn env_from(json_name: &str) -> Attribute {
    let reference = |json_name: &str| {
        Attribute::object(
            json_name,
            [Attribute::string("name"), Attribute::bool("optional")],
        )
    };

    Attribute::list_nested(
        json_name,
        [
            reference("configMapRef"),
            Attribute::string("prefix"),
            reference("secretRef"),
        ],
    )
}

fn se_linux_options(json_name: &str) -> Attribute {
    Attribute::object(
        json_name,
        [
            Attribute::string("level"),
            Attribute::string("role"),
            Attribute::string("type"),
            Attribute::string("user"),
        ],
    )
}

fn profile(json_name: &str, types: &[&str]) -> Attribute {
    Attribute::object(
        json_name,
        [
            Attribute::string("localhostProfile"),
            Attribute::string("type").required().one_of(types),
        ],
    )
}

/// `core/v1.PodSecurityContext`
pub fn pod_security_context(json_name: &str) -> Attribute {
    Attribute::object(
        json_name,
        [
            profile("appArmorProfile", &["Localhost", "RuntimeDefault", "Unconfined"]),
            Attribute::int64("fsGroup"),
            Attribute::string("fsGroupChangePolicy").one_of(&["OnRootMismatch", "Always"]),
            Attribute::int64("runAsGroup"),
            Attribute::bool("runAsNonRoot"),
            Attribute::int64("runAsUser"),
            se_linux_options("seLinuxOptions"),
            profile("seccompProfile", &["Localhost", "RuntimeDefault", "Unconfined"]),
            Attribute::list("supplementalGroups", ElementType::Int64),
            Attribute::list_nested(
                "sysctls",
                [
                    Attribute::string("name").required(),
                    Attribute::string("value").required(),
                ],
            ),
        ],
    )
}

/// Metadata of an object template, e.g. of pods or persistent volume claims.
pub fn object_meta_template(json_name: &str) -> Attribute {
    Attribute::object(
        json_name,
        [
            annotations("annotations"),
            labels("labels"),
            Attribute::string("name"),
        ],
    )
}
