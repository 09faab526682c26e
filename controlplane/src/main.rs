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

use std::sync::Arc;

use clap::Parser;
use gate_controlplane::*;
use kube::Client;
use tracing::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ControllerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let client = Client::try_default().await?;
    let ctx = Context {
        store: Arc::new(KubeStore::new(client.clone())),
        validator: Arc::new(SpecValidator),
        config,
    };

    info!(namespace = ?ctx.config.namespace, "starting gate controller");
    if let Err(error) = gate_controller(client, ctx).await {
        error!("failed to start controller: {error:?}");
        std::process::exit(1);
    }
    Ok(())
}
