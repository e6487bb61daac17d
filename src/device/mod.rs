//! Speaker gateway: the capability the controller drives.
//!
//! Two variants:
//! - `mijia`: MIoT cloud actions for a real XiaoAi speaker (lazy connect)
//! - `mock`: always succeeds (or always fails), logs and journals each call
//!
//! The variant is picked once at startup by [`select_gateway`].

pub mod mijia;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::DeviceConfig;
use crate::error::DeviceError;

pub use mijia::MijiaDevice;
pub use mock::{DeviceCall, MockDevice};

/// Spoken directive that halts whatever the speaker is playing.
pub const STOP_DIRECTIVE: &str = "停止播放";

#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Short name for status reporting ("mijia", "mock").
    fn kind(&self) -> &'static str;

    /// Establish the device handle if it is not already held.
    ///
    /// A failure leaves the handle absent so the next call retries.
    async fn connect(&self) -> Result<(), DeviceError>;

    /// Text-to-speech, starts immediately.
    async fn speak(&self, text: &str) -> Result<(), DeviceError>;

    /// Run `command` as if it had been said to the assistant.
    async fn run_directive(&self, command: &str) -> Result<(), DeviceError>;

    /// Stop playback. Harmless when nothing is playing.
    async fn stop(&self) -> Result<(), DeviceError>;
}

/// Pick the gateway variant for this process.
///
/// Falls back to [`MockDevice`] when `force_mock` is set, when no vendor auth
/// file exists, or when the HTTP client cannot be built.
pub fn select_gateway(config: &DeviceConfig, force_mock: bool) -> Arc<dyn DeviceGateway> {
    if force_mock {
        info!("Mock device requested, running in MOCK mode");
        return Arc::new(MockDevice::new());
    }

    let auth_file = config.auth_file();
    if !auth_file.exists() {
        warn!(
            "Mijia auth file {} not found, running in MOCK mode",
            auth_file.display()
        );
        return Arc::new(MockDevice::new());
    }

    match MijiaDevice::new(config.clone()) {
        Ok(device) => {
            info!("Using Mijia device '{}'", config.name);
            Arc::new(device)
        }
        Err(e) => {
            warn!("{e}, running in MOCK mode");
            Arc::new(MockDevice::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_mock_wins() {
        let gateway = select_gateway(&DeviceConfig::default(), true);
        assert_eq!(gateway.kind(), "mock");
    }

    #[test]
    fn missing_auth_file_selects_mock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = DeviceConfig {
            auth_path: dir.path().join("auth.json").to_string_lossy().into_owned(),
            ..DeviceConfig::default()
        };
        assert_eq!(select_gateway(&config, false).kind(), "mock");
    }

    #[test]
    fn present_auth_file_selects_mijia() {
        let dir = tempfile::tempdir().expect("tempdir");
        let auth = dir.path().join("auth.json");
        std::fs::write(&auth, r#"{"userId": 1, "serviceToken": "t"}"#).expect("write");
        let config = DeviceConfig {
            auth_path: auth.to_string_lossy().into_owned(),
            ..DeviceConfig::default()
        };
        assert_eq!(select_gateway(&config, false).kind(), "mijia");
    }
}
