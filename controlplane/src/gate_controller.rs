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

use std::{
    ops::Sub,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::*;
use crate::crd::Gate;
use crate::processing::Factory;
use crate::status::ResourceStatuses;

use futures::StreamExt;
use kube::{
    api::{Api, ListParams},
    runtime::{controller::Action, watcher::Config, Controller},
    Client, ResourceExt,
};
use tracing::{debug, info, warn};

pub async fn reconcile(gate: Arc<Gate>, ctx: Arc<Context>) -> Result<Action> {
    let name = gate
        .metadata
        .name
        .clone()
        .ok_or(Error::InvalidConfigError("invalid name".to_string()))?;

    let ns = gate
        .metadata
        .namespace
        .clone()
        .ok_or(Error::InvalidConfigError("invalid namespace".to_string()))?;

    reconcile_gate(&NamespacedName::new(ns, name), &ctx).await
}

/// Reconciles the Gate stored under `key`.
///
/// `Ok` means the outcome is final for the current generation. Any `Err` is
/// requeued by the error policy: derivation failures after their status was
/// recorded, and every failed status write.
pub async fn reconcile_gate(key: &NamespacedName, ctx: &Context) -> Result<Action> {
    let start = Instant::now();

    // The store garbage-collects owned objects of deleted Gates.
    let Some(mut gate) = ctx.store.get_gate(key).await? else {
        debug!(gate = %key, "gate not found; assuming it was deleted");
        return Ok(Action::await_change());
    };

    let generation = gate.metadata.generation.ok_or(Error::InvalidConfigError(
        "Gate generation not found".to_string(),
    ))?;

    if is_processed(&gate, generation) {
        debug!(gate = %key, generation, "gate already processed");
        return Ok(Action::await_change());
    }
    info!(gate = %key, generation, "processing gate");

    let failures = ctx.validator.validate(&gate);
    if !failures.is_empty() {
        warn!(gate = %key, failures = failures.len(), "gate failed validation");
        // A malformed spec only changes through a new generation, so no retry.
        update_status(
            ctx,
            &mut gate,
            generation,
            ResourceStatuses::validation_failed(&failures),
        )
        .await?;
        return Ok(Action::await_change());
    }

    let applied = Factory::new(ctx.store.as_ref(), &ctx.config)
        .run(&gate)
        .await;
    if let Err(error) = applied {
        warn!(gate = %key, %error, "failed to apply downstream objects");
        update_status(ctx, &mut gate, generation, ResourceStatuses::failed(&error)).await?;
        return Err(error);
    }

    update_status(ctx, &mut gate, generation, ResourceStatuses::ok()).await?;

    let duration = Instant::now().sub(start);
    info!(gate = %key, "finished reconciling in {:?} ms", duration.as_millis());
    Ok(Action::await_change())
}

// A Gate needs no work when its current generation was observed and the last
// attempt did not end with a downstream error. Downstream errors only come
// from derivation, which is worth retrying.
fn is_processed(gate: &Gate, generation: i64) -> bool {
    let Some(status) = gate.status.as_ref() else {
        return false;
    };
    let failed_downstream = [&status.virtual_service_status, &status.access_rule_status]
        .into_iter()
        .flatten()
        .any(|s| s.is_error());

    status.observed_generation == Some(generation) && !failed_downstream
}

async fn update_status(
    ctx: &Context,
    gate: &mut Gate,
    generation: i64,
    statuses: ResourceStatuses,
) -> Result<()> {
    statuses.apply(gate.status.get_or_insert_with(Default::default), generation);
    ctx.store.update_gate_status(gate).await.map_err(|error| {
        if error.is_conflict() {
            debug!(gate = %gate.name_any(), "gate modified concurrently; status update will be retried");
        } else {
            warn!(gate = %gate.name_any(), %error, "failed to update gate status");
        }
        error
    })
}

pub async fn controller(client: Client, ctx: Context) -> Result<()> {
    let gates: Api<Gate> = match &ctx.config.namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };
    gates
        .list(&ListParams::default().limit(1))
        .await
        .map_err(Error::CRDNotFoundError)?;

    Controller::new(gates, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, Arc::new(ctx))
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

pub fn error_policy(gate: Arc<Gate>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!(gate = %gate.name_any(), "reconcile failed: {:?}", error);
    Action::requeue(Duration::from_secs(ctx.config.error_requeue_secs))
}
