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

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gate_controlplane::crd::{Gate, Rule, StatusCode, VirtualService};
use gate_controlplane::*;
use kube::core::ErrorResponse;

#[derive(Default)]
struct Objects {
    gates: HashMap<NamespacedName, Gate>,
    virtual_services: HashMap<NamespacedName, VirtualService>,
    rules: HashMap<NamespacedName, Rule>,
    writes: usize,
    next_version: u64,
    fail_rule_writes: bool,
}

// In-memory store with resourceVersion checks on updates.
#[derive(Clone, Default)]
struct MemoryStore {
    objects: Arc<Mutex<Objects>>,
}

fn api_error(code: u16, reason: &str) -> Error {
    store_error(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("operation failed: {reason}"),
        reason: reason.to_string(),
        code,
    }))
}

fn key_of(meta: &kube::core::ObjectMeta) -> NamespacedName {
    NamespacedName::new(
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

impl Objects {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.writes += 1;
        self.next_version.to_string()
    }
}

impl MemoryStore {
    fn apply_gate(&self, yaml: &str) {
        let mut gate: Gate = serde_yaml::from_str(yaml).unwrap();
        let mut objects = self.objects.lock().unwrap();
        let key = key_of(&gate.metadata);
        let previous = objects.gates.get(&key).cloned();
        let generation = previous
            .as_ref()
            .and_then(|g| g.metadata.generation)
            .unwrap_or(0)
            + 1;
        gate.metadata.generation = Some(generation);
        gate.metadata.uid = Some("3d5f0c8a-gate".to_string());
        gate.status = previous.and_then(|g| g.status);
        gate.metadata.resource_version = Some(objects.next_version.to_string());
        objects.next_version += 1;
        objects.gates.insert(key, gate);
    }

    fn gate(&self, key: &NamespacedName) -> Gate {
        self.objects.lock().unwrap().gates[key].clone()
    }

    fn rule(&self, key: &NamespacedName) -> Rule {
        self.objects.lock().unwrap().rules[key].clone()
    }

    fn writes(&self) -> usize {
        self.objects.lock().unwrap().writes
    }

    fn fail_rule_writes(&self, fail: bool) {
        self.objects.lock().unwrap().fail_rule_writes = fail;
    }
}

#[async_trait]
impl GateStore for MemoryStore {
    async fn get_gate(&self, key: &NamespacedName) -> Result<Option<Gate>> {
        Ok(self.objects.lock().unwrap().gates.get(key).cloned())
    }

    async fn update_gate_status(&self, gate: &Gate) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        let key = key_of(&gate.metadata);
        let current = objects
            .gates
            .get(&key)
            .cloned()
            .ok_or_else(|| api_error(404, "NotFound"))?;
        if current.metadata.resource_version != gate.metadata.resource_version {
            return Err(api_error(409, "Conflict"));
        }
        let version = objects.bump();
        let stored = objects.gates.get_mut(&key).unwrap();
        stored.status = gate.status.clone();
        stored.metadata.resource_version = Some(version);
        Ok(())
    }

    async fn get_virtual_service(&self, key: &NamespacedName) -> Result<Option<VirtualService>> {
        Ok(self.objects.lock().unwrap().virtual_services.get(key).cloned())
    }

    async fn create_virtual_service(&self, vs: &VirtualService) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        let key = key_of(&vs.metadata);
        if objects.virtual_services.contains_key(&key) {
            return Err(api_error(409, "AlreadyExists"));
        }
        let mut vs = vs.clone();
        vs.metadata.resource_version = Some(objects.bump());
        objects.virtual_services.insert(key, vs);
        Ok(())
    }

    async fn update_virtual_service(&self, vs: &VirtualService) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        let key = key_of(&vs.metadata);
        let current = objects.virtual_services.get(&key).cloned();
        if current.map(|c| c.metadata.resource_version) != Some(vs.metadata.resource_version.clone()) {
            return Err(api_error(409, "Conflict"));
        }
        let mut vs = vs.clone();
        vs.metadata.resource_version = Some(objects.bump());
        objects.virtual_services.insert(key, vs);
        Ok(())
    }

    async fn get_rule(&self, key: &NamespacedName) -> Result<Option<Rule>> {
        Ok(self.objects.lock().unwrap().rules.get(key).cloned())
    }

    async fn create_rule(&self, rule: &Rule) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        if objects.fail_rule_writes {
            return Err(api_error(500, "InternalError"));
        }
        let key = key_of(&rule.metadata);
        if objects.rules.contains_key(&key) {
            return Err(api_error(409, "AlreadyExists"));
        }
        let mut rule = rule.clone();
        rule.metadata.resource_version = Some(objects.bump());
        objects.rules.insert(key, rule);
        Ok(())
    }

    async fn update_rule(&self, rule: &Rule) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        if objects.fail_rule_writes {
            return Err(api_error(500, "InternalError"));
        }
        let key = key_of(&rule.metadata);
        let current = objects.rules.get(&key).cloned();
        if current.map(|c| c.metadata.resource_version) != Some(rule.metadata.resource_version.clone()) {
            return Err(api_error(409, "Conflict"));
        }
        let mut rule = rule.clone();
        rule.metadata.resource_version = Some(objects.bump());
        objects.rules.insert(key, rule);
        Ok(())
    }
}

const ORDERS: &str = r#"
apiVersion: gateway.kyma-project.io/v2alpha1
kind: Gate
metadata:
  name: orders
  namespace: shop
spec:
  service:
    name: orders
    port: 8080
    host: orders.example.com
  gateway: default/kyma-gateway
  auth:
    name: oauth2_introspection
    config:
      paths:
        - scopes: ["read"]
          methods: ["GET"]
"#;

const ORDERS_WRITE: &str = r#"
apiVersion: gateway.kyma-project.io/v2alpha1
kind: Gate
metadata:
  name: orders
  namespace: shop
spec:
  service:
    name: orders
    port: 8080
    host: orders.example.com
  gateway: default/kyma-gateway
  auth:
    name: oauth2_introspection
    config:
      paths:
        - scopes: ["read", "write"]
          methods: ["GET", "POST"]
"#;

const BROKEN: &str = r#"
apiVersion: gateway.kyma-project.io/v2alpha1
kind: Gate
metadata:
  name: orders
  namespace: shop
spec:
  service:
    name: ""
  auth:
    name: oauth2_introspection
    config:
      paths: []
"#;

fn context(store: &MemoryStore) -> Context {
    Context {
        store: Arc::new(store.clone()),
        validator: Arc::new(SpecValidator),
        config: ControllerConfig::default(),
    }
}

fn gate_key() -> NamespacedName {
    NamespacedName::new("shop", "orders")
}

fn rule_key() -> NamespacedName {
    NamespacedName::new("shop", "orders-orders")
}

#[tokio::test]
async fn repeated_delivery_is_idempotent() {
    let store = MemoryStore::default();
    store.apply_gate(ORDERS);
    let ctx = context(&store);

    reconcile_gate(&gate_key(), &ctx).await.unwrap();
    // virtual service, rule and status
    assert_eq!(store.writes(), 3);

    let status_before = store.gate(&gate_key()).status;
    for _ in 0..5 {
        reconcile_gate(&gate_key(), &ctx).await.unwrap();
    }
    assert_eq!(store.writes(), 3);
    assert_eq!(store.gate(&gate_key()).status, status_before);

    let status = status_before.unwrap();
    assert_eq!(status.observed_generation, Some(1));
    assert_eq!(status.gate_status.unwrap().code, StatusCode::Ok);
}

#[tokio::test]
async fn new_generation_updates_rule_in_place() {
    let store = MemoryStore::default();
    store.apply_gate(ORDERS);
    let ctx = context(&store);
    reconcile_gate(&gate_key(), &ctx).await.unwrap();
    let first = store.rule(&rule_key());

    store.apply_gate(ORDERS_WRITE);
    reconcile_gate(&gate_key(), &ctx).await.unwrap();

    let updated = store.rule(&rule_key());
    assert_ne!(first.metadata.resource_version, updated.metadata.resource_version);
    assert_eq!(updated.spec.matcher.unwrap().methods, vec!["GET", "POST"]);
    let scopes = &updated.spec.authenticators[0].config.as_ref().unwrap()["required_scope"];
    assert_eq!(scopes, &serde_json::json!(["read", "write"]));

    let status = store.gate(&gate_key()).status.unwrap();
    assert_eq!(status.observed_generation, Some(2));
}

#[tokio::test]
async fn validation_failure_is_terminal_for_generation() {
    let store = MemoryStore::default();
    store.apply_gate(BROKEN);
    let ctx = context(&store);

    reconcile_gate(&gate_key(), &ctx).await.unwrap();
    let status = store.gate(&gate_key()).status.unwrap();
    assert_eq!(status.observed_generation, Some(1));

    let description = status.gate_status.unwrap().description;
    assert_eq!(
        description,
        "Multiple validation errors: \
         \nAttribute \"spec.service.name\": required\
         \nAttribute \"spec.service.port\": required\
         \nAttribute \"spec.service.host\": required\
         \n2 more error(s)..."
    );
    assert_eq!(status.access_rule_status.unwrap().code, StatusCode::Skipped);

    let writes = store.writes();
    reconcile_gate(&gate_key(), &ctx).await.unwrap();
    assert_eq!(store.writes(), writes);
}

#[tokio::test]
async fn derivation_error_is_retried_until_it_succeeds() {
    let store = MemoryStore::default();
    store.apply_gate(ORDERS);
    store.fail_rule_writes(true);
    let ctx = context(&store);

    let err = reconcile_gate(&gate_key(), &ctx).await.unwrap_err();
    assert!(!err.is_conflict());

    let status = store.gate(&gate_key()).status.unwrap();
    assert_eq!(status.observed_generation, Some(1));
    let rule_status = status.access_rule_status.unwrap();
    assert_eq!(rule_status.code, StatusCode::Error);
    assert_eq!(rule_status.description, err.to_string());

    // The virtual service written before the failure is kept and reused.
    store.fail_rule_writes(false);
    reconcile_gate(&gate_key(), &ctx).await.unwrap();
    let status = store.gate(&gate_key()).status.unwrap();
    assert_eq!(status.virtual_service_status.unwrap().code, StatusCode::Ok);
    assert_eq!(status.access_rule_status.unwrap().code, StatusCode::Ok);
}

#[tokio::test]
async fn stale_status_write_conflicts() {
    let store = MemoryStore::default();
    store.apply_gate(ORDERS);

    let mut stale = store.gate(&gate_key());
    stale.metadata.resource_version = Some("stale".to_string());
    let err = store.update_gate_status(&stale).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn deleted_gate_is_a_no_op() {
    let store = MemoryStore::default();
    let ctx = context(&store);
    reconcile_gate(&gate_key(), &ctx).await.unwrap();
    assert_eq!(store.writes(), 0);
}
