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

use std::fmt::Write;

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;

use crate::consts::{ACCESS_RULE_SKIPPED, MAX_REPORTED_FAILURES, VIRTUAL_SERVICE_SKIPPED};
use crate::crd::{GateStatus, GatewayResourceStatus, StatusCode};
use crate::validation::Failure;

/// Outcome of one reconcile for the Gate itself and each downstream object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceStatuses {
    pub gate: GatewayResourceStatus,
    pub virtual_service: GatewayResourceStatus,
    pub access_rule: GatewayResourceStatus,
}

impl ResourceStatuses {
    pub fn ok() -> Self {
        Self {
            gate: GatewayResourceStatus::new(StatusCode::Ok, ""),
            virtual_service: GatewayResourceStatus::new(StatusCode::Ok, ""),
            access_rule: GatewayResourceStatus::new(StatusCode::Ok, ""),
        }
    }

    pub fn validation_failed(failures: &[Failure]) -> Self {
        Self {
            gate: GatewayResourceStatus::new(
                StatusCode::Error,
                validation_description(failures),
            ),
            virtual_service: GatewayResourceStatus::new(
                StatusCode::Skipped,
                VIRTUAL_SERVICE_SKIPPED,
            ),
            access_rule: GatewayResourceStatus::new(StatusCode::Skipped, ACCESS_RULE_SKIPPED),
        }
    }

    pub fn failed(error: &crate::Error) -> Self {
        let description = error.to_string();
        Self {
            gate: GatewayResourceStatus::new(StatusCode::Error, description.clone()),
            virtual_service: GatewayResourceStatus::new(StatusCode::Error, description.clone()),
            access_rule: GatewayResourceStatus::new(StatusCode::Error, description),
        }
    }

    // Records the outcome for `generation` on the status, leaving fields this
    // controller does not own untouched.
    pub fn apply(self, status: &mut GateStatus, generation: i64) {
        status.observed_generation = Some(generation);
        status.last_processed_time = Some(metav1::Time(Utc::now()));
        status.gate_status = Some(self.gate);
        status.virtual_service_status = Some(self.virtual_service);
        status.access_rule_status = Some(self.access_rule);
    }
}

// Formats validation failures for the Gate status description. Consumers
// match on this text, so the wording and the truncation are fixed.
pub fn validation_description(failures: &[Failure]) -> String {
    let mut description = String::new();

    if let [failure] = failures {
        let _ = write!(
            description,
            "Validation error: Attribute \"{}\": {}",
            failure.attribute_path, failure.message
        );
        return description;
    }

    description.push_str("Multiple validation errors: ");
    for failure in failures.iter().take(MAX_REPORTED_FAILURES) {
        let _ = write!(
            description,
            "\nAttribute \"{}\": {}",
            failure.attribute_path, failure.message
        );
    }
    if failures.len() > MAX_REPORTED_FAILURES {
        let _ = write!(
            description,
            "\n{} more error(s)...",
            failures.len() - MAX_REPORTED_FAILURES
        );
    }
    description
}
