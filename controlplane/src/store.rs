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

use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

use crate::consts::FIELD_MANAGER;
use crate::crd::{Gate, Rule, VirtualService};
use crate::{store_error, Error, NamespacedName, Result};

/// Typed access to Gates and the objects derived from them.
///
/// Every write is subject to optimistic concurrency; conflicts surface as
/// [`Error::ConflictError`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GateStore: Send + Sync {
    /// Returns None when the Gate does not exist.
    async fn get_gate(&self, key: &NamespacedName) -> Result<Option<Gate>>;

    /// Replaces the status sub-resource of the Gate.
    async fn update_gate_status(&self, gate: &Gate) -> Result<()>;

    async fn get_virtual_service(&self, key: &NamespacedName) -> Result<Option<VirtualService>>;
    async fn create_virtual_service(&self, vs: &VirtualService) -> Result<()>;
    async fn update_virtual_service(&self, vs: &VirtualService) -> Result<()>;

    async fn get_rule(&self, key: &NamespacedName) -> Result<Option<Rule>>;
    async fn create_rule(&self, rule: &Rule) -> Result<()>;
    async fn update_rule(&self, rule: &Rule) -> Result<()>;
}

/// [`GateStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn post_params() -> PostParams {
        PostParams {
            dry_run: false,
            field_manager: Some(FIELD_MANAGER.to_string()),
        }
    }
}

fn object_name(name: &Option<String>) -> Result<&str> {
    name.as_deref()
        .ok_or_else(|| Error::InvalidConfigError("object has no name".to_string()))
}

fn object_namespace(namespace: &Option<String>) -> Result<&str> {
    namespace
        .as_deref()
        .ok_or_else(|| Error::InvalidConfigError("object has no namespace".to_string()))
}

#[async_trait]
impl GateStore for KubeStore {
    async fn get_gate(&self, key: &NamespacedName) -> Result<Option<Gate>> {
        let api: Api<Gate> = Api::namespaced(self.client.clone(), &key.namespace);
        api.get_opt(&key.name).await.map_err(store_error)
    }

    async fn update_gate_status(&self, gate: &Gate) -> Result<()> {
        let api: Api<Gate> = Api::namespaced(
            self.client.clone(),
            object_namespace(&gate.metadata.namespace)?,
        );
        let data = serde_json::to_vec(gate).map_err(Error::SerializationError)?;
        api.replace_status(object_name(&gate.metadata.name)?, &Self::post_params(), data)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn get_virtual_service(&self, key: &NamespacedName) -> Result<Option<VirtualService>> {
        let api: Api<VirtualService> = Api::namespaced(self.client.clone(), &key.namespace);
        api.get_opt(&key.name).await.map_err(store_error)
    }

    async fn create_virtual_service(&self, vs: &VirtualService) -> Result<()> {
        let api: Api<VirtualService> =
            Api::namespaced(self.client.clone(), object_namespace(&vs.metadata.namespace)?);
        api.create(&Self::post_params(), vs)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn update_virtual_service(&self, vs: &VirtualService) -> Result<()> {
        let api: Api<VirtualService> =
            Api::namespaced(self.client.clone(), object_namespace(&vs.metadata.namespace)?);
        api.replace(object_name(&vs.metadata.name)?, &Self::post_params(), vs)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn get_rule(&self, key: &NamespacedName) -> Result<Option<Rule>> {
        let api: Api<Rule> = Api::namespaced(self.client.clone(), &key.namespace);
        api.get_opt(&key.name).await.map_err(store_error)
    }

    async fn create_rule(&self, rule: &Rule) -> Result<()> {
        let api: Api<Rule> =
            Api::namespaced(self.client.clone(), object_namespace(&rule.metadata.namespace)?);
        api.create(&Self::post_params(), rule)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn update_rule(&self, rule: &Rule) -> Result<()> {
        let api: Api<Rule> =
            Api::namespaced(self.client.clone(), object_namespace(&rule.metadata.namespace)?);
        api.replace(object_name(&rule.metadata.name)?, &Self::post_params(), rule)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
