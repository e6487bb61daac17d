//! Scene controller: passthrough device calls plus the relaxation scene.
//!
//! IDLE → RUNNING_SCENE → IDLE
//!
//! The scene is single-flight. A start request while one is running is
//! turned away, not queued. `stop_all` raises the interrupt signal, which the
//! scene task only observes at its two timed waits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::device::DeviceGateway;
use crate::error::DeviceError;

pub const WELCOME_MESSAGE: &str = "你好，臭竹米，我是小爱同学，我现在要给你来点舒缓的音乐";
pub const AMBIENT_COMMAND: &str = "播放水流的声音";

/// The scene's two waits. Fixed for the controller's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTimings {
    /// Time given to the welcome speech before the ambient sound starts.
    pub welcome_pause: Duration,
    /// How long the ambient sound plays before the scene stops it.
    pub ambient_duration: Duration,
}

impl Default for SceneTimings {
    fn default() -> Self {
        Self {
            welcome_pause: Duration::from_secs(3),
            ambient_duration: Duration::from_secs(40),
        }
    }
}

impl SceneTimings {
    pub fn total(&self) -> Duration {
        self.welcome_pause + self.ambient_duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    Idle,
    RunningScene,
}

impl std::fmt::Display for SceneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::RunningScene => write!(f, "RUNNING_SCENE"),
        }
    }
}

/// Outcome of a scene start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneStart {
    Started,
    AlreadyRunning,
}

enum WaitOutcome {
    Elapsed,
    Interrupted,
}

pub struct SceneController {
    device: Arc<dyn DeviceGateway>,
    timings: SceneTimings,
    running: AtomicBool,
    interrupt: watch::Sender<bool>,
}

impl SceneController {
    pub fn new(device: Arc<dyn DeviceGateway>, timings: SceneTimings) -> Self {
        let (interrupt, _) = watch::channel(false);
        Self {
            device,
            timings,
            running: AtomicBool::new(false),
            interrupt,
        }
    }

    pub fn device_kind(&self) -> &'static str {
        self.device.kind()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SceneState {
        if self.is_running() {
            SceneState::RunningScene
        } else {
            SceneState::Idle
        }
    }

    /// Start the relaxation scene in the background.
    ///
    /// Returns immediately. Device failures inside the scene are logged,
    /// never reported here.
    pub fn start_scene(self: &Arc<Self>) -> SceneStart {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Relax scene is already running");
            return SceneStart::AlreadyRunning;
        }
        info!("State: {} → {}", SceneState::Idle, SceneState::RunningScene);

        // Cleared before the task exists, so a stop landing right after
        // acceptance still interrupts this run.
        self.interrupt.send_replace(false);

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.run_scene().await;
        });

        SceneStart::Started
    }

    /// Speak `text` on the device.
    pub async fn speak_text(&self, text: &str) -> Result<(), DeviceError> {
        self.device.connect().await?;
        info!("TTS: {text}");
        self.device.speak(text).await
    }

    /// Execute `command` as a spoken directive (e.g. "关灯", "今天天气怎么样").
    pub async fn execute_directive(&self, command: &str) -> Result<(), DeviceError> {
        self.device.connect().await?;
        info!("Command: {command}");
        self.device.run_directive(command).await
    }

    /// Stop playback and interrupt a running scene.
    pub async fn stop_all(&self) -> Result<(), DeviceError> {
        self.device.connect().await?;
        info!("Stopping all playback...");
        self.interrupt.send_replace(true);
        self.device.stop().await
    }

    async fn run_scene(&self) {
        let _slot = RunningSlot(&self.running);
        let mut interrupt = self.interrupt.subscribe();

        if let Err(e) = self.device.connect().await {
            warn!("Device unavailable, skipping relax scene: {e}");
            return;
        }

        if let Err(e) = self.play_scene(&mut interrupt).await {
            error!("Error in relax scene: {e}");
        }
    }

    async fn play_scene(&self, interrupt: &mut watch::Receiver<bool>) -> Result<(), DeviceError> {
        info!("Starting relax scene...");
        self.device.speak(WELCOME_MESSAGE).await?;

        if let WaitOutcome::Interrupted = wait_or_interrupt(interrupt, self.timings.welcome_pause).await
        {
            info!("Scene interrupted during welcome message.");
            return Ok(());
        }

        self.device.run_directive(AMBIENT_COMMAND).await?;
        info!("Playing nature sounds...");

        match wait_or_interrupt(interrupt, self.timings.ambient_duration).await {
            // The interrupting caller already sent its own stop
            WaitOutcome::Interrupted => info!("Scene interrupted by stop command."),
            WaitOutcome::Elapsed => {
                info!("Scene finished normally. Stopping playback.");
                self.device.stop().await?;
            }
        }
        Ok(())
    }
}

async fn wait_or_interrupt(interrupt: &mut watch::Receiver<bool>, limit: Duration) -> WaitOutcome {
    match tokio::time::timeout(limit, interrupt.wait_for(|stop| *stop)).await {
        Ok(_) => WaitOutcome::Interrupted,
        Err(_) => WaitOutcome::Elapsed,
    }
}

/// Releases the single-flight slot when the scene task ends, however it ends.
struct RunningSlot<'a>(&'a AtomicBool);

impl Drop for RunningSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
        info!("State: {} → {}", SceneState::RunningScene, SceneState::Idle);
    }
}
