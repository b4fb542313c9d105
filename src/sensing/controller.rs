use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::BatchDispatcher;
use crate::segmentation::Tracker;

use super::input::ActivitySource;
use super::loop_worker::tracking_loop;
use super::window::WindowSensor;

/// Owns the background tracking loop.
pub struct TrackerController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl TrackerController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start<A, S>(
        &mut self,
        tracker: Tracker<A>,
        sensor: S,
        dispatcher: BatchDispatcher,
    ) -> Result<()>
    where
        A: ActivitySource + Send + 'static,
        S: WindowSensor + Send + 'static,
    {
        if self.handle.is_some() {
            bail!("tracking already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(tracking_loop(
            tracker,
            sensor,
            dispatcher,
            cancel_token.clone(),
        ));

        info!("Tracking loop started");
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Cancel the loop and wait for its final commit and flush.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("tracking loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for TrackerController {
    fn default() -> Self {
        Self::new()
    }
}
