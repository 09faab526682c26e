/*
Copyright 2024 The Kubernetes Authors.

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::{fmt, sync::Arc};

use thiserror::Error;

pub use config::ControllerConfig;
pub use gate_controller::{controller as gate_controller, reconcile_gate};
pub use store::{GateStore, KubeStore};
pub use validation::{GateValidator, SpecValidator};

pub mod builders;
pub mod config;
pub mod consts;
pub mod crd;
pub mod gate_controller;
pub mod processing;
pub mod status;
pub mod store;
pub mod validation;

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Typed access to Gates and their downstream objects
    pub store: Arc<dyn GateStore>,
    pub validator: Arc<dyn GateValidator>,
    pub config: ControllerConfig,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("kube error: {0}")]
    KubeError(#[source] kube::Error),
    #[error("conflict: {0}")]
    ConflictError(String),
    #[error("invalid configuration: `{0}`")]
    InvalidConfigError(String),
    #[error("invalid auth config: {0}")]
    AuthConfigError(#[source] serde_json::Error),
    #[error("unsupported authentication mode: `{0}`")]
    UnsupportedAuthMode(String),
    #[error("{kind} {name} is controlled by another owner")]
    OwnershipError { kind: &'static str, name: String },
    #[error("serialization error: {0}")]
    SerializationError(#[source] serde_json::Error),
    #[error("error querying Gate CRD: `{0}`; is the CRD installed?")]
    CRDNotFoundError(#[source] kube::Error),
}

impl Error {
    /// Returns true for optimistic-concurrency and already-exists failures.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ConflictError(_))
    }
}

// Maps a store failure into the crate error, keeping 409 responses distinguishable.
pub fn store_error(error: kube::Error) -> Error {
    match error {
        kube::Error::Api(response) if response.code == 409 => {
            Error::ConflictError(response.message)
        }
        other => Error::KubeError(other),
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NamespacedName {
    pub name: String,
    pub namespace: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("request failed: {reason}"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn conflicts_are_distinguishable() {
        let err = store_error(api_error(409, "Conflict"));
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "conflict: request failed: Conflict");

        let err = store_error(api_error(500, "InternalError"));
        assert!(!err.is_conflict());
        assert!(matches!(err, Error::KubeError(_)));
    }

    #[test]
    fn namespaced_name_display() {
        assert_eq!(NamespacedName::new("prod", "orders").to_string(), "prod/orders");
    }
}
