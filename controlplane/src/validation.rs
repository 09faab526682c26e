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

use std::sync::LazyLock;

use regex::Regex;

use crate::crd::{Gate, ServiceRef};
use crate::processing::AuthMode;

static DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());

static DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
});

/// A single problem with a Gate field, reported in the order it was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub attribute_path: String,
    pub message: String,
}

impl Failure {
    pub fn new(attribute_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attribute_path: attribute_path.into(),
            message: message.into(),
        }
    }
}

// Allows to validate Gate instances created by the user.
pub trait GateValidator: Send + Sync {
    fn validate(&self, gate: &Gate) -> Vec<Failure>;
}

/// Checks required fields and the auth config against the declared mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpecValidator;

impl GateValidator for SpecValidator {
    fn validate(&self, gate: &Gate) -> Vec<Failure> {
        let mut failures = vec![];
        validate_service(gate.spec.service.as_ref(), &mut failures);
        validate_gateway(gate.spec.gateway.as_deref(), &mut failures);

        match &gate.spec.auth {
            None => failures.push(Failure::new("spec.auth", "required")),
            Some(auth) => match AuthMode::from_name(&auth.name) {
                Some(mode) => failures.extend(mode.validate_config(auth.config.as_ref())),
                None if auth.name.is_empty() => {
                    failures.push(Failure::new("spec.auth.name", "required"))
                }
                None => failures.push(Failure::new(
                    "spec.auth.name",
                    format!("unsupported authentication mode \"{}\"", auth.name),
                )),
            },
        }

        failures
    }
}

fn validate_service(service: Option<&ServiceRef>, failures: &mut Vec<Failure>) {
    let Some(service) = service else {
        failures.push(Failure::new("spec.service", "required"));
        return;
    };

    match service.name.as_deref() {
        None | Some("") => failures.push(Failure::new("spec.service.name", "required")),
        Some(name) if !DNS_LABEL.is_match(name) => failures.push(Failure::new(
            "spec.service.name",
            "must be a lowercase RFC 1123 label",
        )),
        Some(_) => {}
    }

    match service.port {
        None => failures.push(Failure::new("spec.service.port", "required")),
        Some(port) if !(1..=65535).contains(&port) => failures.push(Failure::new(
            "spec.service.port",
            "must be between 1 and 65535",
        )),
        Some(_) => {}
    }

    match service.host.as_deref() {
        None | Some("") => failures.push(Failure::new("spec.service.host", "required")),
        Some(host) if !DNS_SUBDOMAIN.is_match(host) => failures.push(Failure::new(
            "spec.service.host",
            "must be a lowercase RFC 1123 subdomain",
        )),
        Some(_) => {}
    }
}

fn validate_gateway(gateway: Option<&str>, failures: &mut Vec<Failure>) {
    match gateway {
        None => failures.push(Failure::new("spec.gateway", "required")),
        Some(gw) if gw.trim().is_empty() => {
            failures.push(Failure::new("spec.gateway", "required"))
        }
        Some(gw) if gw.contains(char::is_whitespace) => failures.push(Failure::new(
            "spec.gateway",
            "must not contain whitespace",
        )),
        Some(_) => {}
    }
}
