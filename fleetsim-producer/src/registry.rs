// Fleetsim Producer - Telemetry publisher for simulated sensor fleets
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Schema registry client.
//!
//! Registers the record schema under a subject with a Confluent-compatible
//! schema registry and returns the id to frame Avro payloads with.
//! Registering a schema the registry already holds returns the existing id.

use serde::Deserialize;
use tracing::info;

use crate::error::RegistryError;

/// Content type of schema registry requests.
const REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Credentials for a registry behind basic auth.
#[derive(Debug, Clone)]
pub struct RegistryCredentials {
    pub api_key: String,
    pub api_secret: Option<String>,
}

/// Response of `POST /subjects/{subject}/versions`.
#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: u32,
}

/// HTTP client for a schema registry.
pub struct SchemaRegistry {
    client: reqwest::Client,
    url: String,
    credentials: Option<RegistryCredentials>,
}

impl SchemaRegistry {
    /// Create a client for the registry at `url`, e.g. `https://registry:8081`.
    pub fn new(url: impl Into<String>, credentials: Option<RegistryCredentials>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Register an Avro schema under `subject` and return its id.
    pub async fn register(&self, subject: &str, schema: &str) -> Result<u32, RegistryError> {
        let body = serde_json::json!({
            "schemaType": "AVRO",
            "schema": schema,
        });

        let mut request = self
            .client
            .post(format!("{}/subjects/{}/versions", self.url, subject))
            .header(reqwest::header::CONTENT_TYPE, REGISTRY_CONTENT_TYPE)
            .body(body.to_string());
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.api_key, credentials.api_secret.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RegistryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let registered: RegisterResponse = serde_json::from_str(&response.text().await?)
            .map_err(RegistryError::InvalidResponse)?;
        info!(subject, schema_id = registered.id, "Schema registered");
        Ok(registered.id)
    }
}
