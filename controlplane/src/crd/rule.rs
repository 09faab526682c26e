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

use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Oathkeeper access rule: which requests reach `upstream` and which
/// authenticators and authorizer they pass through first.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "oathkeeper.ory.sh",
    version = "v1alpha1",
    kind = "Rule",
    plural = "rules",
    namespaced,
    schema = "disabled"
)]
pub struct RuleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<Upstream>,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<RuleMatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authenticators: Vec<Handler>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizer: Option<Handler>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mutators: Vec<Handler>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Upstream {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_host: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RuleMatch {
    #[serde(default)]
    pub methods: Vec<String>,
    pub url: String,
}

/// A named Oathkeeper pipeline handler with its handler-specific config.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Handler {
    #[serde(rename = "handler")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl Handler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: None,
        }
    }

    pub fn with_config(name: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            config: Some(config),
        }
    }
}
