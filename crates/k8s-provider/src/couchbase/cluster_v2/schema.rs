//! Attributes of the `couchbase.com/v2` `CouchbaseCluster` resource.
//!
//! The `spec` tree mirrors the OpenAPI schema of the Couchbase Operator CRD. Only the fields
//! declared here are sent to and read back from the API server.

use std::sync::LazyLock;

use crate::schema::{
    Attribute, AttributeType, ElementType, ResourceSchema, Validator,
    fragments::{
        self, affinity, env_from, env_vars, label_selector, local_object_references,
        object_meta_template, pod_security_context, quantity, resource_requirements, tolerations,
    },
};

pub static SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| ResourceSchema {
    description: "The CouchbaseCluster resource represents a Couchbase cluster. It allows \
                  configuration of cluster topology, networking, storage and security options."
        .to_owned(),
    version: 0,
    attributes: vec![
        Attribute::local("id", AttributeType::String)
            .computed()
            .description("The unique identifier of the object, '<namespace>/<name>'."),
        Attribute::local("force_conflicts", AttributeType::Bool)
            .optional_computed()
            .description(
                "If 'true', server-side apply will force the changes against conflicts.",
            ),
        Attribute::local("field_manager", AttributeType::String)
            .optional_computed()
            .description("The name of the manager used to track field ownership."),
        Attribute::local("deletion_propagation", AttributeType::String)
            .one_of(&["Orphan", "Foreground", "Background"])
            .description(
                "Decides if a deletion will propagate to the dependents of the object, and how \
                 the garbage collector will handle the propagation.",
            ),
        wait_for_upsert(),
        wait_for_delete(),
        Attribute::local("api_version", AttributeType::String)
            .computed()
            .description("The API group of the requested resource."),
        Attribute::local("kind", AttributeType::String)
            .computed()
            .description("The type of the requested resource."),
        metadata(),
        spec(),
    ],
});

fn wait_timing() -> [Attribute; 2] {
    [
        Attribute::local("timeout", AttributeType::String)
            .validator(Validator::Duration)
            .description("The length of time to wait before giving up. Defaults to '30s'."),
        Attribute::local("poll_interval", AttributeType::String)
            .validator(Validator::Duration)
            .description("The number of seconds to wait between polls. Defaults to '5s'."),
    ]
}

fn wait_for_upsert() -> Attribute {
    let [timeout, poll_interval] = wait_timing();
    Attribute::local(
        "wait_for_upsert",
        AttributeType::ListNested {
            attributes: vec![
                Attribute::local("jsonpath", AttributeType::String)
                    .required()
                    .description("Relative JSONPath query to use when waiting for the condition."),
                Attribute::local("value", AttributeType::String)
                    .required()
                    .description("The value to wait for."),
                timeout,
                poll_interval,
            ],
        },
    )
    .description("Conditions that must hold after the resource was created or updated.")
}

fn wait_for_delete() -> Attribute {
    Attribute::local(
        "wait_for_delete",
        AttributeType::SingleNested {
            attributes: wait_timing().into(),
        },
    )
    .description("Wait until the resource is gone after deleting it.")
}

fn metadata() -> Attribute {
    Attribute::object(
        "metadata",
        [
            Attribute::string("name")
                .required()
                .requires_replace()
                .validator(Validator::DnsSubdomain)
                .description("Unique identifier for this object in its namespace."),
            Attribute::string("namespace")
                .required()
                .requires_replace()
                .validator(Validator::DnsLabel)
                .description("The namespace of this object."),
            fragments::labels("labels").description(
                "Keys and values that can be used to organize and categorize objects.",
            ),
            fragments::annotations("annotations").description(
                "Unstructured key value map stored with a resource that may be set by external \
                 tools to store and retrieve arbitrary metadata.",
            ),
        ],
    )
    .required()
    .description("Data that helps uniquely identify this object.")
}

const SERVICES: &[&str] = &["data", "index", "query", "search", "eventing", "analytics"];
const SERVICE_TYPES: &[&str] = &["NodePort", "LoadBalancer"];
const LOG_LEVELS: &[&str] = &[
    "silent", "fatal", "error", "warn", "info", "verbose", "timing", "debug", "trace",
];

fn spec() -> Attribute {
    Attribute::object(
        "spec",
        [
            Attribute::string("image").required().description(
                "The container image name that will be used by the Operator to create server \
                 pods. Images must be from Couchbase Server 7.0.0 or later.",
            ),
            Attribute::bool("paused").description(
                "Paused allows the reconciliation of the cluster to be paused, e.g. for \
                 manual intervention.",
            ),
            Attribute::bool("antiAffinity").description(
                "AntiAffinity forces the Operator to schedule different Couchbase server pods \
                 on different Kubernetes nodes.",
            ),
            Attribute::bool("softwareUpdateNotifications"),
            Attribute::list("serverGroups", ElementType::String).description(
                "ServerGroups define the set of availability zones to distribute pods over.",
            ),
            Attribute::string("platform").one_of(&["aws", "gce", "azure"]),
            Attribute::string("recoveryPolicy")
                .one_of(&["PrioritizeDataIntegrity", "PrioritizeUptime"])
                .description(
                    "RecoveryPolicy controls how aggressive the Operator is when recovering \
                     cluster topology.",
                ),
            Attribute::string("upgradeStrategy").one_of(&["RollingUpgrade", "ImmediateUpgrade"]),
            Attribute::object(
                "rollingUpgrade",
                [
                    Attribute::int64("maxUpgradable").int_range(1, None),
                    Attribute::string("maxUpgradablePercent")
                        .regex("^(100|[1-9][0-9]|[1-9])%$"),
                ],
            )
            .description(
                "When UpgradeStrategy is set to RollingUpgrade it will, by default, upgrade one \
                 pod at a time.",
            ),
            Attribute::bool("hibernate"),
            Attribute::string("hibernationStrategy").one_of(&["Immediate"]),
            Attribute::bool("enablePreviewScaling"),
            Attribute::bool("enableOnlineVolumeExpansion"),
            Attribute::int64("onlineVolumeExpansionTimeoutInMins").int_range(0, 30),
            Attribute::string("autoscaleStabilizationPeriod"),
            Attribute::bool("envImagePrecedence"),
            pod_security_context("securityContext"),
            cluster(),
            security(),
            networking(),
            logging(),
            servers(),
            buckets(),
            xdcr(),
            backup(),
            monitoring(),
            volume_claim_templates(),
        ],
    )
    .required()
    .description("ClusterSpec is the specification for the cluster.")
}

fn fragmentation_threshold(json_name: &str) -> Attribute {
    Attribute::object(
        json_name,
        [
            Attribute::int64("percent").int_range(2, 100),
            quantity("size"),
        ],
    )
}

fn cluster() -> Attribute {
    Attribute::object(
        "cluster",
        [
            Attribute::string("clusterName")
                .description(
                    "ClusterName defines the name of the cluster, as displayed in the Couchbase \
                     UI.",
                ),
            quantity("dataServiceMemoryQuota"),
            quantity("indexServiceMemoryQuota"),
            quantity("searchServiceMemoryQuota"),
            quantity("eventingServiceMemoryQuota"),
            quantity("analyticsServiceMemoryQuota"),
            Attribute::string("indexStorageSetting").one_of(&["memory_optimized", "plasma"]),
            Attribute::string("autoFailoverTimeout"),
            Attribute::int64("autoFailoverMaxCount").int_range(1, 3),
            Attribute::bool("autoFailoverOnDataDiskIssues"),
            Attribute::string("autoFailoverOnDataDiskIssuesTimePeriod"),
            Attribute::bool("autoFailoverServerGroup"),
            Attribute::object(
                "autoCompaction",
                [
                    fragmentation_threshold("databaseFragmentationThreshold"),
                    fragmentation_threshold("viewFragmentationThreshold"),
                    Attribute::bool("parallelCompaction"),
                    Attribute::object(
                        "timeWindow",
                        [
                            Attribute::bool("abortCompactionOutsideWindow"),
                            Attribute::string("start").regex("^(2[0-3]|[01]?[0-9]):([0-5]?[0-9])$"),
                            Attribute::string("end").regex("^(2[0-3]|[01]?[0-9]):([0-5]?[0-9])$"),
                        ],
                    ),
                    Attribute::string("tombstonePurgeInterval"),
                ],
            ),
            Attribute::object(
                "data",
                [
                    Attribute::int64("readerThreads").int_range(4, 64),
                    Attribute::int64("writerThreads").int_range(4, 64),
                    Attribute::int64("nonIOThreads").int_range(1, 64),
                    Attribute::int64("auxIOThreads").int_range(1, 64),
                    Attribute::int64("minReplicasCount").int_range(0, 3),
                ],
            ),
            Attribute::object(
                "indexer",
                [
                    Attribute::int64("threads").int_range(0, None),
                    Attribute::string("logLevel").one_of(LOG_LEVELS),
                    Attribute::int64("maxRollbackPoints").int_range(1, None),
                    Attribute::string("memorySnapshotInterval"),
                    Attribute::string("stableSnapshotInterval"),
                    Attribute::string("storageMode").one_of(&["memory_optimized", "plasma"]),
                ],
            ),
            Attribute::object(
                "query",
                [
                    Attribute::bool("backfillEnabled"),
                    quantity("temporarySpace"),
                    Attribute::bool("temporarySpaceUnlimited"),
                ],
            ),
        ],
    )
    .description(
        "ClusterSettings define Couchbase cluster-wide settings such as memory allocation, \
         failover characteristics and index settings.",
    )
}

fn security() -> Attribute {
    Attribute::object(
        "security",
        [
            Attribute::string("adminSecret").required().description(
                "AdminSecret is the name of a Kubernetes secret to use for administrator \
                 authentication. It must contain 'username' and 'password' keys.",
            ),
            Attribute::object(
                "rbac",
                [
                    Attribute::bool("managed"),
                    label_selector("selector"),
                ],
            ),
            Attribute::object(
                "ldap",
                [
                    Attribute::list("hosts", ElementType::String).required(),
                    Attribute::int64("port").int_range(0, 65535),
                    Attribute::string("encryption").one_of(&["None", "StartTLSExtension", "TLS"]),
                    Attribute::bool("serverCertValidation"),
                    Attribute::string("tlsSecret"),
                    Attribute::string("bindDN"),
                    Attribute::string("bindSecret"),
                    Attribute::bool("authenticationEnabled"),
                    Attribute::object("userDNMapping", [Attribute::string("template")]),
                    Attribute::bool("authorizationEnabled"),
                    Attribute::string("groupsQuery"),
                    Attribute::bool("nestedGroupsEnabled"),
                    Attribute::int64("nestedGroupsMaxDepth").int_range(1, 100),
                    Attribute::int64("cacheValueLifetime"),
                ],
            ),
            Attribute::int64("uiSessionTimeout")
                .int_range(0, 16666)
                .description(
                    "UISessionTimeout sets how long, in minutes, before a user is declared \
                     inactive.",
                ),
            pod_security_context("securityContext"),
        ],
    )
    .required()
}

fn networking() -> Attribute {
    Attribute::object(
        "networking",
        [
            Attribute::bool("exposeAdminConsole"),
            Attribute::list("adminConsoleServices", ElementType::String).one_of(SERVICES),
            Attribute::string("adminConsoleServiceType").one_of(SERVICE_TYPES),
            Attribute::list("exposedFeatures", ElementType::String)
                .one_of(&["admin", "xdcr", "client"]),
            Attribute::string("exposedFeatureServiceType").one_of(SERVICE_TYPES),
            Attribute::string("exposedFeatureTrafficPolicy").one_of(&["Cluster", "Local"]),
            Attribute::bool("disableUIOverHTTP"),
            Attribute::bool("disableUIOverHTTPS"),
            Attribute::object(
                "tls",
                [
                    Attribute::object(
                        "static",
                        [
                            Attribute::string("serverSecret"),
                            Attribute::string("operatorSecret"),
                        ],
                    ),
                    Attribute::object(
                        "secretSource",
                        [
                            Attribute::string("serverSecretName").required(),
                            Attribute::string("clientSecretName"),
                        ],
                    ),
                    Attribute::list("rootCAs", ElementType::String).named("root_cas"),
                    Attribute::string("clientCertificatePolicy").one_of(&["enable", "mandatory"]),
                    Attribute::list_nested(
                        "clientCertificatePaths",
                        [
                            Attribute::string("path").required(),
                            Attribute::string("prefix"),
                            Attribute::string("delimiter"),
                        ],
                    ),
                    Attribute::string("nodeToNodeEncryption")
                        .one_of(&["ControlPlaneOnly", "All", "Strict"]),
                    Attribute::string("tlsMinimumVersion")
                        .one_of(&["TLS1.0", "TLS1.1", "TLS1.2", "TLS1.3"]),
                    Attribute::list("cipherSuites", ElementType::String),
                ],
            )
            .description("TLS defines the TLS configuration for the cluster."),
            Attribute::object("dns", [Attribute::string("domain")]),
            Attribute::string("networkPlatform").one_of(&["Istio"]),
            Attribute::string("addressFamily").one_of(&["IPv4", "IPv6"]),
            Attribute::object(
                "cloudNativeGateway",
                [
                    Attribute::string("image").required(),
                    Attribute::object("tls", [Attribute::string("serverSecretName").required()]),
                    Attribute::string("logLevel").one_of(&["info", "debug", "trace"]),
                    Attribute::int64("terminationGracePeriodSeconds").int_range(0, 3600),
                ],
            ),
        ],
    )
}

fn sidecar(json_name: &str) -> Attribute {
    Attribute::object(
        json_name,
        [
            Attribute::string("image"),
            Attribute::string("configurationMountPath"),
            resource_requirements("resources"),
        ],
    )
}

fn logging() -> Attribute {
    Attribute::object(
        "logging",
        [
            Attribute::object(
                "server",
                [
                    Attribute::bool("enabled"),
                    Attribute::string("configurationName"),
                    Attribute::bool("manageConfiguration"),
                    sidecar("sidecar"),
                ],
            ),
            Attribute::object(
                "audit",
                [
                    Attribute::bool("enabled"),
                    Attribute::list("disabledEvents", ElementType::Int64),
                    Attribute::list_nested(
                        "disabledUsers",
                        [
                            Attribute::string("name").required(),
                            Attribute::string("domain")
                                .required()
                                .one_of(&["local", "external"]),
                        ],
                    ),
                    Attribute::object(
                        "rotation",
                        [
                            Attribute::string("interval"),
                            quantity("size"),
                            Attribute::string("pruneAge"),
                        ],
                    ),
                    Attribute::object(
                        "garbageCollection",
                        [Attribute::object(
                            "sidecar",
                            [
                                Attribute::bool("enabled"),
                                Attribute::string("image"),
                                Attribute::string("age"),
                                Attribute::string("interval"),
                                resource_requirements("resources"),
                            ],
                        )],
                    ),
                ],
            ),
            Attribute::string("logRetentionTime").regex(r"^\d+(ns|us|ms|s|m|h)$"),
            Attribute::int64("logRetentionCount").int_range(0, None),
        ],
    )
}

fn pod_template() -> Attribute {
    Attribute::object(
        "pod",
        [
            object_meta_template("metadata"),
            Attribute::object(
                "spec",
                [
                    Attribute::map("nodeSelector", ElementType::String),
                    tolerations("tolerations"),
                    affinity("affinity"),
                    Attribute::string("priorityClassName"),
                    Attribute::string("serviceAccountName"),
                    Attribute::bool("automountServiceAccountToken"),
                    local_object_references("imagePullSecrets"),
                    Attribute::string("dnsPolicy").one_of(&[
                        "ClusterFirstWithHostNet",
                        "ClusterFirst",
                        "Default",
                        "None",
                    ]),
                    Attribute::string("runtimeClassName"),
                    pod_security_context("securityContext"),
                ],
            ),
        ],
    )
    .description("Pod defines a template used to create pod for each Couchbase server instance.")
}

fn servers() -> Attribute {
    Attribute::list_nested(
        "servers",
        [
            Attribute::string("name")
                .required()
                .regex("^[-_a-zA-Z0-9]+$")
                .description("The name of the server class, unique within the cluster."),
            Attribute::int64("size")
                .required()
                .int_range(0, None)
                .description("Size is the expected requested of the server class."),
            Attribute::list("services", ElementType::String)
                .one_of(SERVICES)
                .description(
                    "Services is the set of Couchbase services to run on this server class.",
                ),
            Attribute::list("serverGroups", ElementType::String),
            Attribute::bool("autoscaleEnabled"),
            resource_requirements("resources"),
            env_vars("env"),
            env_from("envFrom"),
            Attribute::object(
                "volumeMounts",
                [
                    Attribute::string("default"),
                    Attribute::string("data"),
                    Attribute::string("index"),
                    Attribute::list("analytics", ElementType::String),
                    Attribute::string("logs"),
                ],
            )
            .description(
                "VolumeMounts define persistent volume claims to attach to pod, by volume claim \
                 template name.",
            ),
            pod_template(),
        ],
    )
    .required()
}

fn buckets() -> Attribute {
    Attribute::object(
        "buckets",
        [
            Attribute::bool("managed"),
            label_selector("selector"),
            Attribute::bool("synchronize"),
        ],
    )
}

fn xdcr() -> Attribute {
    Attribute::object(
        "xdcr",
        [
            Attribute::bool("managed"),
            label_selector("selector"),
            Attribute::list_nested(
                "remoteClusters",
                [
                    Attribute::string("name").required(),
                    Attribute::string("uuid").required().regex("^[0-9a-f]{32}$"),
                    Attribute::string("hostname").required(),
                    Attribute::string("authenticationSecret"),
                    Attribute::object("replications", [label_selector("selector")]),
                    Attribute::object("tls", [Attribute::string("secret")]),
                ],
            ),
        ],
    )
}

fn backup() -> Attribute {
    Attribute::object(
        "backup",
        [
            Attribute::bool("managed"),
            Attribute::string("image"),
            Attribute::string("serviceAccountName"),
            resource_requirements("resources"),
            label_selector("selector"),
            Attribute::string("s3Secret").named("s3_secret"),
            Attribute::map("nodeSelector", ElementType::String),
            tolerations("tolerations"),
            local_object_references("imagePullSecrets"),
        ],
    )
}

fn monitoring() -> Attribute {
    Attribute::object(
        "monitoring",
        [Attribute::object(
            "prometheus",
            [
                Attribute::bool("enabled"),
                Attribute::string("image"),
                Attribute::string("authorizationSecret"),
                resource_requirements("resources"),
                Attribute::int64("refreshRate").int_range(1, None),
            ],
        )],
    )
}

fn volume_claim_templates() -> Attribute {
    Attribute::list_nested(
        "volumeClaimTemplates",
        [
            Attribute::object(
                "metadata",
                [
                    Attribute::string("name").required(),
                    fragments::labels("labels"),
                    fragments::annotations("annotations"),
                ],
            )
            .required(),
            Attribute::object(
                "spec",
                [
                    Attribute::string("storageClassName"),
                    Attribute::list("accessModes", ElementType::String),
                    Attribute::object(
                        "resources",
                        [
                            Attribute::map("limits", ElementType::String),
                            Attribute::map("requests", ElementType::String),
                        ],
                    ),
                    label_selector("selector"),
                    Attribute::string("volumeMode").one_of(&["Filesystem", "Block"]),
                    Attribute::object(
                        "dataSourceRef",
                        [
                            Attribute::string("apiGroup"),
                            Attribute::string("kind").required(),
                            Attribute::string("name").required(),
                            Attribute::string("namespace"),
                        ],
                    )
                    .description(
                        "DataSourceRef specifies the object from which to populate the volume \
                         with data.",
                    ),
                ],
            ),
        ],
    )
    .description(
        "VolumeClaimTemplates define the desired characteristics of a volume that can be \
         requested/claimed by a pod.",
    )
}
