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

use kube::ResourceExt;
use serde::Serialize;
use tracing::warn;

use super::{routing_object, DownstreamObjects, ExposedService, Strategy};
use crate::builders::{access_rule, gate_owner_reference, AccessRuleParams};
use crate::consts::{ALLOW_AUTHORIZER, OAUTH2_INTROSPECTION_MODE};
use crate::crd::{Gate, Handler, OauthModeConfig};
use crate::validation::Failure;
use crate::{Error, Result};

const CONFIG_PATH: &str = "spec.auth.config";

const HTTP_METHODS: [&str; 9] = [
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "CONNECT", "OPTIONS", "TRACE",
];

// Authenticator config understood by Oathkeeper's oauth2_introspection handler.
#[derive(Serialize)]
struct IntrospectionConfig<'a> {
    required_scope: &'a [String],
}

pub fn decode_config(config: Option<&serde_json::Value>) -> Result<OauthModeConfig> {
    let raw = config
        .ok_or_else(|| Error::InvalidConfigError(format!("{CONFIG_PATH} is not set")))?;
    serde_json::from_value(raw.clone()).map_err(Error::AuthConfigError)
}

pub fn validate_config(config: Option<&serde_json::Value>) -> Vec<Failure> {
    let Some(raw) = config else {
        return vec![Failure::new(CONFIG_PATH, "required")];
    };
    let config: OauthModeConfig = match serde_json::from_value(raw.clone()) {
        Ok(config) => config,
        Err(e) => {
            return vec![Failure::new(
                CONFIG_PATH,
                format!("invalid {OAUTH2_INTROSPECTION_MODE} config: {e}"),
            )]
        }
    };

    let mut failures = vec![];
    if config.paths.is_empty() {
        failures.push(Failure::new(
            format!("{CONFIG_PATH}.paths"),
            "at least one path is required",
        ));
    }
    for (i, path) in config.paths.iter().enumerate() {
        let attribute = format!("{CONFIG_PATH}.paths[{i}].methods");
        if path.methods.is_empty() {
            failures.push(Failure::new(&attribute, "at least one method is required"));
        }
        for method in &path.methods {
            if !HTTP_METHODS.contains(&method.as_str()) {
                failures.push(Failure::new(
                    &attribute,
                    format!("unsupported HTTP method \"{method}\""),
                ));
            }
        }
    }
    failures
}

/// Protects the exposed service with OAuth2 token introspection.
pub struct OauthStrategy {
    cluster_domain: String,
}

impl OauthStrategy {
    pub fn new(cluster_domain: String) -> Self {
        Self { cluster_domain }
    }
}

impl Strategy for OauthStrategy {
    fn derive(&self, gate: &Gate) -> Result<DownstreamObjects> {
        let service = ExposedService::from_gate(gate)?;
        let config = decode_config(gate.spec.auth.as_ref().and_then(|a| a.config.as_ref()))?;

        // Multi-path configs pass validation but only the first path is applied.
        let path = config.paths.first().ok_or_else(|| {
            Error::InvalidConfigError(format!("{CONFIG_PATH}.paths is empty"))
        })?;
        if config.paths.len() > 1 {
            warn!(
                gate = %gate.name_any(),
                paths = config.paths.len(),
                "ignoring all but the first oauth path"
            );
        }

        let scopes = serde_json::to_value(IntrospectionConfig {
            required_scope: &path.scopes,
        })
        .map_err(Error::SerializationError)?;

        let owner = gate_owner_reference(gate);
        let rule = access_rule(&AccessRuleParams {
            name: service.object_name(),
            namespace: service.namespace.clone(),
            owner: owner.clone(),
            upstream_url: service.upstream_url(&self.cluster_domain),
            match_url: service.match_url(),
            methods: path.methods.clone(),
            authorizer: Handler::new(ALLOW_AUTHORIZER),
            authenticators: vec![Handler::with_config(OAUTH2_INTROSPECTION_MODE, scopes)],
        });

        Ok(DownstreamObjects {
            virtual_service: routing_object(&service, owner, &self.cluster_domain),
            rule,
        })
    }
}
