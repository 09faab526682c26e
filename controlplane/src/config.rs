use clap::Parser;

use crate::consts::DEFAULT_CLUSTER_DOMAIN;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[clap(name = "controller", about = "Reconciles Gates into routing and access rules")]
pub struct ControllerConfig {
    /// Only watch Gates in this namespace
    #[clap(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,
    /// DNS suffix of in-cluster services
    #[clap(long, env = "CLUSTER_DOMAIN", default_value = DEFAULT_CLUSTER_DOMAIN)]
    pub cluster_domain: String,
    /// Seconds to wait before retrying a failed reconcile
    #[clap(long, env = "ERROR_REQUEUE_SECS", default_value_t = 5)]
    pub error_requeue_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_string(),
            error_requeue_secs: 5,
        }
    }
}
