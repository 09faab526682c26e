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

//! Derivation of downstream objects from a Gate and their persistence.
//!
//! The authentication mode declared in `spec.auth.name` selects a
//! [`Strategy`]; the [`Factory`] runs it and upserts the produced objects
//! through the [`GateStore`].

use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{core::ObjectMeta, ResourceExt};
use tracing::{debug, info};

use crate::builders::{virtual_service, VirtualServiceParams};
use crate::consts::{MATCH_ALL_PATHS_REGEX, OAUTH2_INTROSPECTION_MODE};
use crate::crd::{Gate, Rule, VirtualService};
use crate::validation::Failure;
use crate::{ControllerConfig, Error, GateStore, NamespacedName, Result};

pub mod oauth;

/// Authentication modes a Gate can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    Oauth2Introspection,
}

impl AuthMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            OAUTH2_INTROSPECTION_MODE => Some(AuthMode::Oauth2Introspection),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AuthMode::Oauth2Introspection => OAUTH2_INTROSPECTION_MODE,
        }
    }

    /// Structural checks of `spec.auth.config` for this mode.
    pub fn validate_config(self, config: Option<&serde_json::Value>) -> Vec<Failure> {
        match self {
            AuthMode::Oauth2Introspection => oauth::validate_config(config),
        }
    }

    fn strategy(self, config: &ControllerConfig) -> Box<dyn Strategy> {
        match self {
            AuthMode::Oauth2Introspection => {
                Box::new(oauth::OauthStrategy::new(config.cluster_domain.clone()))
            }
        }
    }
}

impl FromStr for AuthMode {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        AuthMode::from_name(name).ok_or_else(|| Error::UnsupportedAuthMode(name.to_string()))
    }
}

/// The objects a strategy derives for one Gate.
#[derive(Clone, Debug)]
pub struct DownstreamObjects {
    pub virtual_service: VirtualService,
    pub rule: Rule,
}

pub trait Strategy: Send + Sync {
    fn derive(&self, gate: &Gate) -> Result<DownstreamObjects>;
}

// The exposed service as declared on a Gate, with every required field present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ExposedService {
    pub gate_name: String,
    pub namespace: String,
    pub name: String,
    pub port: u32,
    pub host: String,
    pub gateway: String,
}

impl ExposedService {
    pub fn from_gate(gate: &Gate) -> Result<Self> {
        let missing = |field: &str| Error::InvalidConfigError(format!("{field} is not set"));
        let service = gate.spec.service.as_ref().ok_or_else(|| missing("spec.service"))?;

        Ok(Self {
            gate_name: gate.name_any(),
            namespace: gate.namespace().ok_or_else(|| missing("metadata.namespace"))?,
            name: service.name.clone().ok_or_else(|| missing("spec.service.name"))?,
            port: service.port.ok_or_else(|| missing("spec.service.port"))?,
            host: service.host.clone().ok_or_else(|| missing("spec.service.host"))?,
            gateway: gate.spec.gateway.clone().ok_or_else(|| missing("spec.gateway"))?,
        })
    }

    // Both downstream objects share this name.
    pub fn object_name(&self) -> String {
        format!("{}-{}", self.gate_name, self.name)
    }

    pub fn cluster_host(&self, cluster_domain: &str) -> String {
        format!("{}.{}.svc.{}", self.name, self.namespace, cluster_domain)
    }

    pub fn upstream_url(&self, cluster_domain: &str) -> String {
        format!("http://{}:{}", self.cluster_host(cluster_domain), self.port)
    }

    pub fn match_url(&self) -> String {
        format!("<http|https>://{}/<.*>", self.host)
    }
}

// Routing object sending every path on the public host to the service.
pub(crate) fn routing_object(
    service: &ExposedService,
    owner: Option<OwnerReference>,
    cluster_domain: &str,
) -> VirtualService {
    virtual_service(&VirtualServiceParams {
        name: service.object_name(),
        namespace: service.namespace.clone(),
        owner,
        host: service.host.clone(),
        gateways: vec![service.gateway.clone()],
        uri_regex: MATCH_ALL_PATHS_REGEX.to_string(),
        destination_host: service.cluster_host(cluster_domain),
        destination_port: service.port,
    })
}

/// Resolves the strategy for a Gate and persists what it derives.
pub struct Factory<'a> {
    store: &'a dyn GateStore,
    config: &'a ControllerConfig,
}

impl<'a> Factory<'a> {
    pub fn new(store: &'a dyn GateStore, config: &'a ControllerConfig) -> Self {
        Self { store, config }
    }

    pub fn strategy_for(&self, gate: &Gate) -> Result<Box<dyn Strategy>> {
        let auth = gate
            .spec
            .auth
            .as_ref()
            .ok_or_else(|| Error::InvalidConfigError("spec.auth is not set".to_string()))?;
        let mode: AuthMode = auth.name.parse()?;
        debug!(mode = mode.name(), "resolved authentication strategy");
        Ok(mode.strategy(self.config))
    }

    pub async fn run(&self, gate: &Gate) -> Result<()> {
        let objects = self.strategy_for(gate)?.derive(gate)?;
        self.apply_virtual_service(objects.virtual_service).await?;
        self.apply_rule(objects.rule).await?;
        Ok(())
    }

    async fn apply_virtual_service(&self, desired: VirtualService) -> Result<()> {
        let key = object_key(&desired.metadata)?;
        let Some(mut existing) = self.store.get_virtual_service(&key).await? else {
            info!(virtual_service = %key, "creating virtual service");
            return self.store.create_virtual_service(&desired).await;
        };

        ensure_controlled_by(&existing.metadata, &desired.metadata, "VirtualService", &key)?;
        let owners = merged_owner_references(&existing.metadata, &desired.metadata);
        if existing.spec == desired.spec && existing.metadata.owner_references == owners {
            debug!(virtual_service = %key, "virtual service up to date");
            return Ok(());
        }

        existing.spec = desired.spec;
        existing.metadata.owner_references = owners;
        info!(virtual_service = %key, "updating virtual service");
        self.store.update_virtual_service(&existing).await
    }

    async fn apply_rule(&self, desired: Rule) -> Result<()> {
        let key = object_key(&desired.metadata)?;
        let Some(mut existing) = self.store.get_rule(&key).await? else {
            info!(rule = %key, "creating access rule");
            return self.store.create_rule(&desired).await;
        };

        ensure_controlled_by(&existing.metadata, &desired.metadata, "Rule", &key)?;
        let owners = merged_owner_references(&existing.metadata, &desired.metadata);
        if existing.spec == desired.spec && existing.metadata.owner_references == owners {
            debug!(rule = %key, "access rule up to date");
            return Ok(());
        }

        existing.spec = desired.spec;
        existing.metadata.owner_references = owners;
        info!(rule = %key, "updating access rule");
        self.store.update_rule(&existing).await
    }
}

fn object_key(meta: &ObjectMeta) -> Result<NamespacedName> {
    match (&meta.namespace, &meta.name) {
        (Some(namespace), Some(name)) => Ok(NamespacedName::new(namespace, name)),
        _ => Err(Error::InvalidConfigError(
            "derived object has no name or namespace".to_string(),
        )),
    }
}

fn controller_uid(meta: &ObjectMeta) -> Option<&str> {
    meta.owner_references
        .as_ref()?
        .iter()
        .find(|r| r.controller == Some(true))
        .map(|r| r.uid.as_str())
}

// Owner references for an existing object: references that do not control it
// are kept, controllers are replaced by the desired ones.
fn merged_owner_references(
    existing: &ObjectMeta,
    desired: &ObjectMeta,
) -> Option<Vec<OwnerReference>> {
    let desired_refs = desired.owner_references.as_deref().unwrap_or_default();
    let mut refs: Vec<OwnerReference> = existing
        .owner_references
        .iter()
        .flatten()
        .filter(|r| r.controller != Some(true) && !desired_refs.iter().any(|d| d.uid == r.uid))
        .cloned()
        .collect();
    refs.extend(desired_refs.iter().cloned());

    if refs.is_empty() {
        None
    } else {
        Some(refs)
    }
}

// An existing object may only be overwritten when nothing else controls it.
fn ensure_controlled_by(
    existing: &ObjectMeta,
    desired: &ObjectMeta,
    kind: &'static str,
    key: &NamespacedName,
) -> Result<()> {
    match controller_uid(existing) {
        Some(current) if Some(current) != controller_uid(desired) => Err(Error::OwnershipError {
            kind,
            name: key.to_string(),
        }),
        _ => Ok(()),
    }
}
