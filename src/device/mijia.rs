//! Real speaker backed by MIoT spec actions.
//!
//! Connecting loads the auth file left by the vendor login tool, lists the
//! account's devices and caches the `did` of the one matching the configured
//! name. Actions are then posted to `/miotspec/action`:
//! - `play-text`: `in = [text]`
//! - `execute-text-directive`: `in = [command, true]` (silent execution)

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::{DeviceGateway, STOP_DIRECTIVE};
use crate::config::DeviceConfig;
use crate::error::DeviceError;

#[derive(Debug, Clone, Deserialize)]
struct MijiaAuth {
    #[serde(rename = "userId")]
    user_id: Value,
    #[serde(rename = "serviceToken")]
    service_token: String,
}

impl MijiaAuth {
    fn cookie(&self) -> String {
        let user_id = match &self.user_id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        format!("userId={user_id}; serviceToken={}", self.service_token)
    }
}

#[derive(Debug, Clone)]
struct DeviceHandle {
    did: String,
    cookie: String,
}

#[derive(Debug, Deserialize)]
struct MiotResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

pub struct MijiaDevice {
    config: DeviceConfig,
    client: Client,
    // None until the first successful connect, and again after a transport failure
    handle: Mutex<Option<DeviceHandle>>,
}

impl MijiaDevice {
    pub fn new(config: DeviceConfig) -> Result<Self, DeviceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DeviceError::ConnectionFailed(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            handle: Mutex::new(None),
        })
    }

    async fn establish(&self) -> Result<DeviceHandle, DeviceError> {
        let auth = load_auth(&self.config.auth_file()).await?;
        let cookie = auth.cookie();

        let listing = self
            .post(
                &cookie,
                "/home/device_list",
                json!({ "getVirtualModel": false, "getHuamiDevices": 0 }),
            )
            .await
            .map_err(|e| match e {
                DeviceError::CommandFailed(msg) => DeviceError::ConnectionFailed(msg),
                other => other,
            })?;

        let did = find_device(&listing.result, &self.config.name).ok_or_else(|| {
            DeviceError::ConnectionFailed(format!(
                "device '{}' not found in account",
                self.config.name
            ))
        })?;

        Ok(DeviceHandle { did, cookie })
    }

    async fn post(&self, cookie: &str, path: &str, body: Value) -> Result<MiotResponse, DeviceError> {
        let url = format!("{}{path}", self.config.api_base.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::COOKIE, cookie)
            .header("x-xiaomi-protocal-flag-cli", "PROTOCAL-HTTP2")
            .json(&body)
            .send()
            .await
            .map_err(|e| DeviceError::ConnectionFailed(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DeviceError::ConnectionFailed(format!(
                "{path} rejected credentials ({status})"
            )));
        }
        if !status.is_success() {
            return Err(DeviceError::CommandFailed(format!("{path} returned status {status}")));
        }

        let parsed: MiotResponse = resp
            .json()
            .await
            .map_err(|e| DeviceError::CommandFailed(format!("invalid response from {path}: {e}")))?;
        if parsed.code != 0 {
            return Err(DeviceError::CommandFailed(format!(
                "{path} returned code {}: {}",
                parsed.code, parsed.message
            )));
        }
        Ok(parsed)
    }

    async fn run_action(&self, action: &str, aiid: u32, args: Value) -> Result<(), DeviceError> {
        let handle = self
            .handle
            .lock()
            .await
            .clone()
            .ok_or_else(|| DeviceError::ConnectionFailed("device not connected".into()))?;

        let body = json!({
            "params": {
                "did": handle.did,
                "siid": self.config.siid,
                "aiid": aiid,
                "in": args,
            }
        });
        debug!("MIoT {action} (siid={}, aiid={aiid})", self.config.siid);

        let resp = match self.post(&handle.cookie, "/miotspec/action", body).await {
            Ok(resp) => resp,
            Err(e @ DeviceError::ConnectionFailed(_)) => {
                *self.handle.lock().await = None;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        if let Some(code) = resp.result.get("code").and_then(Value::as_i64) {
            if code != 0 {
                return Err(DeviceError::CommandFailed(format!(
                    "{action} rejected by device (code {code})"
                )));
            }
        }

        if self.config.sleep_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.sleep_ms)).await;
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceGateway for MijiaDevice {
    fn kind(&self) -> &'static str {
        "mijia"
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        let mut guard = self.handle.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        info!("Initializing Mijia API...");
        match self.establish().await {
            Ok(handle) => {
                info!("Device '{}' connected (did {})", self.config.name, handle.did);
                *guard = Some(handle);
                Ok(())
            }
            Err(e) => {
                error!("Failed to initialize device: {e}");
                Err(e)
            }
        }
    }

    async fn speak(&self, text: &str) -> Result<(), DeviceError> {
        self.run_action("play-text", self.config.play_text_aiid, json!([text]))
            .await
    }

    async fn run_directive(&self, command: &str) -> Result<(), DeviceError> {
        self.run_action(
            "execute-text-directive",
            self.config.directive_aiid,
            json!([command, true]),
        )
        .await
    }

    async fn stop(&self) -> Result<(), DeviceError> {
        self.run_directive(STOP_DIRECTIVE).await
    }
}

async fn load_auth(path: &Path) -> Result<MijiaAuth, DeviceError> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        DeviceError::ConnectionFailed(format!("failed to read auth file {}: {e}", path.display()))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        DeviceError::ConnectionFailed(format!("invalid auth file {}: {e}", path.display()))
    })
}

/// Find the `did` of the device named `name` in a `device_list` result.
fn find_device(result: &Value, name: &str) -> Option<String> {
    result
        .get("list")?
        .as_array()?
        .iter()
        .find(|dev| dev.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|dev| match dev.get("did")? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
}
