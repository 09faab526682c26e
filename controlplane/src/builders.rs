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

//! Construction of the downstream objects from plain parameter structs.
//!
//! Builders never talk to the cluster and never fail: a missing owner simply
//! leaves the object without owner references.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{core::ObjectMeta, Resource};

use crate::crd::{
    Destination, Gate, Handler, HttpMatchRequest, HttpRoute, HttpRouteDestination, PortSelector,
    Rule, RuleMatch, RuleSpec, StringMatch, Upstream, VirtualService, VirtualServiceSpec,
};

// Returns the controlling owner reference pointing back at the Gate, or None
// when the Gate has not been persisted yet (no uid).
pub fn gate_owner_reference(gate: &Gate) -> Option<OwnerReference> {
    gate.controller_owner_ref(&())
}

fn object_meta(name: &str, namespace: &str, owner: Option<&OwnerReference>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        owner_references: owner.map(|o| vec![o.clone()]),
        ..Default::default()
    }
}

#[derive(Clone, Debug, Default)]
pub struct VirtualServiceParams {
    pub name: String,
    pub namespace: String,
    pub owner: Option<OwnerReference>,
    pub host: String,
    pub gateways: Vec<String>,
    pub uri_regex: String,
    pub destination_host: String,
    pub destination_port: u32,
}

pub fn virtual_service(params: &VirtualServiceParams) -> VirtualService {
    let spec = VirtualServiceSpec {
        hosts: vec![params.host.clone()],
        gateways: params.gateways.clone(),
        http: vec![HttpRoute {
            matches: vec![HttpMatchRequest {
                uri: Some(StringMatch {
                    regex: Some(params.uri_regex.clone()),
                    ..Default::default()
                }),
            }],
            route: vec![HttpRouteDestination {
                destination: Destination {
                    host: params.destination_host.clone(),
                    port: Some(PortSelector {
                        number: params.destination_port,
                    }),
                },
            }],
        }],
    };

    VirtualService {
        metadata: object_meta(&params.name, &params.namespace, params.owner.as_ref()),
        spec,
    }
}

#[derive(Clone, Debug, Default)]
pub struct AccessRuleParams {
    pub name: String,
    pub namespace: String,
    pub owner: Option<OwnerReference>,
    pub upstream_url: String,
    pub match_url: String,
    pub methods: Vec<String>,
    pub authorizer: Handler,
    pub authenticators: Vec<Handler>,
}

pub fn access_rule(params: &AccessRuleParams) -> Rule {
    let spec = RuleSpec {
        upstream: Some(Upstream {
            url: params.upstream_url.clone(),
            ..Default::default()
        }),
        matcher: Some(RuleMatch {
            methods: params.methods.clone(),
            url: params.match_url.clone(),
        }),
        authenticators: params.authenticators.clone(),
        authorizer: Some(params.authorizer.clone()),
        mutators: vec![],
    };

    Rule {
        metadata: object_meta(&params.name, &params.namespace, params.owner.as_ref()),
        spec,
    }
}
