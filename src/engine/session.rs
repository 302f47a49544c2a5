use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::runner::{self, RunReport, RunShared};
use super::{AcquisitionConfig, ProgressSnapshot, RunState};
use crate::analysis::XyResult;
use crate::core::{AcquisitionError, ChannelData};
use crate::export::{self, ExportOptions};
use crate::hal::InstrumentTransport;

/// Owns the configuration and the results of one instrument's acquisitions.
///
/// At most one run is in flight at a time. While it runs, [`progress`] may be
/// polled from anywhere; a channel's bundle appears in [`channel_data`] only
/// once that channel is fully transferred and analysed.
///
/// [`progress`]: AcquisitionSession::progress
/// [`channel_data`]: AcquisitionSession::channel_data
pub struct AcquisitionSession {
    config: AcquisitionConfig,
    shared: Arc<RunShared>,
    handle: Option<JoinHandle<Result<RunReport, AcquisitionError>>>,
}

impl AcquisitionSession {
    pub fn new(config: AcquisitionConfig) -> Result<Self, AcquisitionError> {
        config.validate()?;
        Ok(Self {
            config,
            shared: Arc::new(RunShared::new()),
            handle: None,
        })
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Reset all previous results and launch a run in the background.
    pub fn start(&mut self, transport: Arc<dyn InstrumentTransport>) -> Result<(), AcquisitionError> {
        if self.is_running() {
            return Err(AcquisitionError::RunInProgress);
        }
        self.config.validate()?;

        self.shared.reset(self.config.channels.len());
        let task = runner::execute(self.config.clone(), transport, self.shared.clone());
        self.handle = Some(tokio::spawn(task));
        Ok(())
    }

    /// Wait for the run started by [`start`](Self::start).
    pub async fn wait(&mut self) -> Result<RunReport, AcquisitionError> {
        let handle = self.handle.take().ok_or(AcquisitionError::NotStarted)?;
        handle
            .await
            .map_err(|e| AcquisitionError::TaskFailed(e.to_string()))?
    }

    /// Start a run and wait for it.
    pub async fn run(
        &mut self,
        transport: Arc<dyn InstrumentTransport>,
    ) -> Result<RunReport, AcquisitionError> {
        self.start(transport)?;
        self.wait().await
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.shared.progress.snapshot()
    }

    pub fn state(&self) -> RunState {
        self.shared.state()
    }

    /// Snapshot of the bundles published so far.
    pub fn channel_data(&self) -> ChannelData {
        self.shared.channel_data()
    }

    pub fn xy(&self) -> Option<XyResult> {
        self.shared.xy()
    }

    pub fn export_csv(&self, options: &ExportOptions) -> String {
        export::to_csv(&self.channel_data(), self.xy().as_ref(), options)
    }

    /// Write the current results to `<dir>/<timestamp>_data.csv`.
    pub fn save_csv(&self, dir: impl AsRef<Path>, options: &ExportOptions) -> Result<PathBuf> {
        export::save_csv(dir, &self.export_csv(options))
    }
}
