//! Stand-in speaker used when the vendor API is unavailable, and in tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

use super::DeviceGateway;
use crate::error::DeviceError;

/// One gateway call, as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Connect,
    Speak(String),
    Directive(String),
    Stop,
}

#[derive(Debug, Default)]
pub struct MockDevice {
    fail: bool,
    calls: Mutex<Vec<DeviceCall>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose every call fails with `ConnectionFailed`.
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::default(),
        }
    }

    /// Every call made so far, in order. Failed calls are included.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: DeviceCall) -> Result<(), DeviceError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if self.fail {
            Err(DeviceError::ConnectionFailed("mock device is offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeviceGateway for MockDevice {
    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::Connect)
    }

    async fn speak(&self, text: &str) -> Result<(), DeviceError> {
        info!("[MOCK] Speaking: {text}");
        self.record(DeviceCall::Speak(text.to_string()))
    }

    async fn run_directive(&self, command: &str) -> Result<(), DeviceError> {
        info!("[MOCK] Executing: {command}");
        self.record(DeviceCall::Directive(command.to_string()))
    }

    async fn stop(&self) -> Result<(), DeviceError> {
        info!("[MOCK] Stopped.");
        self.record(DeviceCall::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn journals_calls_in_order() {
        let mock = MockDevice::new();
        mock.connect().await.expect("connect");
        mock.speak("你好").await.expect("speak");
        mock.run_directive("打开台灯").await.expect("directive");
        mock.stop().await.expect("stop");

        assert_eq!(
            mock.calls(),
            vec![
                DeviceCall::Connect,
                DeviceCall::Speak("你好".into()),
                DeviceCall::Directive("打开台灯".into()),
                DeviceCall::Stop,
            ]
        );
    }

    #[tokio::test]
    async fn failing_mock_still_journals() {
        let mock = MockDevice::failing();
        let err = mock.speak("hi").await.expect_err("should fail");
        assert!(matches!(err, DeviceError::ConnectionFailed(_)));
        assert_eq!(mock.calls(), vec![DeviceCall::Speak("hi".into())]);
    }
}
