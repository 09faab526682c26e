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

use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Intent to expose an in-cluster service behind a shared gateway with a
/// given authentication mode.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "gateway.kyma-project.io",
    version = "v2alpha1",
    kind = "Gate",
    plural = "gates",
    namespaced,
    status = "GateStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct GateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthStrategy>,
    /// Shared ingress gateway, e.g. `kyma-system/kyma-gateway`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_external: Option<bool>,
}

/// Authentication mode and its mode-specific configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AuthStrategy {
    #[serde(default)]
    pub name: String,
    /// Opaque until decoded by the strategy registered for `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GateStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed_time: Option<metav1::Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_status: Option<GatewayResourceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_service_status: Option<GatewayResourceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_service_status: Option<GatewayResourceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_rule_status: Option<GatewayResourceStatus>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusCode {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "SKIPPED")]
    Skipped,
    #[serde(rename = "ERROR")]
    Error,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GatewayResourceStatus {
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl GatewayResourceStatus {
    pub fn new(code: StatusCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.code == StatusCode::Error
    }
}

/// `spec.auth.config` of the `oauth2_introspection` mode.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct OauthModeConfig {
    #[serde(default)]
    pub paths: Vec<OauthOption>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct OauthOption {
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
}
