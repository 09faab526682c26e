// Field manager used for every write to the cluster.
pub const FIELD_MANAGER: &str = "gate-controlplane";

// Authentication mode name for the OAuth2 token introspection strategy.
pub const OAUTH2_INTROSPECTION_MODE: &str = "oauth2_introspection";

// Oathkeeper authorizer handler that lets every authenticated request through.
pub const ALLOW_AUTHORIZER: &str = "allow";

// Regex matching every request path on the routing object.
pub const MATCH_ALL_PATHS_REGEX: &str = "/.*";

// Default DNS suffix of in-cluster services.
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

// Status descriptions for downstream objects that were not touched.
pub const VIRTUAL_SERVICE_SKIPPED: &str = "Skipped setting Istio Virtual Service";
pub const ACCESS_RULE_SKIPPED: &str = "Skipped setting Oathkeeper Access Rule";

// Number of validation failures spelled out in a status description.
pub const MAX_REPORTED_FAILURES: usize = 3;
