/*
 * Console Application Operator - converges ConsoleApplication resources
 * Copyright (C) 2025 Console Application team
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

//! Controller Service - Kubernetes controller for `ConsoleApplication` CRDs
//!
//! This service:
//! - Watches `ConsoleApplication` resources and the objects they own
//! - Creates the ImageStream, BuildConfig, Deployment, Service and Route
//! - Reports progress through status conditions
//! - Serves health and readiness endpoints

use app_controller::{run_app_controller, ControllerConfig};
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_PATH: &str = "/config/config.yaml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!(
        "Starting ConsoleApplication controller v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client = kube::Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let namespace = std::env::var("WATCH_NAMESPACE")
        .ok()
        .filter(|ns| !ns.trim().is_empty());
    match &namespace {
        Some(ns) => info!("Watching namespace {}", ns),
        None => info!("Watching all namespaces"),
    }

    let config = load_controller_config(&client).await;

    let controller_handle = {
        let client = client.clone();
        tokio::spawn(async move {
            if let Err(e) = run_app_controller(client, namespace, config).await {
                error!("Controller error: {}", e);
            }
        })
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(TimeoutLayer::new(Duration::from_secs(10))),
        );

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Controller HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller_handle.abort();
    info!("Controller service stopped");

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "app-controller",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check() -> Json<Value> {
    Json(json!({
        "status": "ready",
        "service": "app-controller",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Mounted file first, then a `ConfigMap` named by `CONFIG_MAP_NAME`, then defaults
async fn load_controller_config(client: &kube::Client) -> ControllerConfig {
    let override_path = std::env::var("CONFIG_PATH").ok();
    let config_path = override_path
        .as_deref()
        .filter(|path| Path::new(path).exists())
        .unwrap_or(DEFAULT_CONFIG_PATH);

    match ControllerConfig::from_mounted_file(config_path) {
        Ok(cfg) => {
            info!("Loaded controller configuration from {}", config_path);
            return cfg;
        }
        Err(e) => warn!("No usable configuration file at {}: {}", config_path, e),
    }

    if let (Ok(namespace), Ok(name)) = (
        std::env::var("POD_NAMESPACE"),
        std::env::var("CONFIG_MAP_NAME"),
    ) {
        match ControllerConfig::from_configmap(client, &namespace, &name).await {
            Ok(cfg) => {
                info!("Loaded controller configuration from ConfigMap {}/{}", namespace, name);
                return cfg;
            }
            Err(e) => warn!("Failed to load ConfigMap {}/{}: {}", namespace, name, e),
        }
    }

    info!("Using default controller configuration");
    ControllerConfig::default()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
