use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{transfer, AcquisitionConfig, Progress, RunState, RunStatus};
use crate::analysis::{analyze_channel, analyze_xy, convert, AnalysisPlan, XyResult};
use crate::core::{
    AcquisitionError, Channel, ChannelData, ChannelError, ConnectionError, FitConvergenceError,
    PhysicalSeries, ResultBundle, XyError,
};
use crate::hal::{InstrumentTransport, ManagedSession};
use crate::observability::{MetricsCollector, RunMonitor, TransferMetrics};

/// State shared between an [`AcquisitionSession`](super::AcquisitionSession)
/// and its background task.
#[derive(Debug, Default)]
pub struct RunShared {
    pub progress: Progress,
    data: Mutex<ChannelData>,
    xy: Mutex<Option<XyResult>>,
    state: Mutex<RunState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RunShared {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every result of the previous run and enter `Running`.
    pub fn reset(&self, channels: usize) {
        lock(&self.data).clear();
        *lock(&self.xy) = None;
        self.progress.reset(channels);
        self.transition(RunState::Running {
            start_time: Some(Instant::now()),
            channels,
        });
    }

    pub fn transition(&self, next: RunState) {
        let mut state = lock(&self.state);
        if !state.can_transition_to(&next) {
            warn!("unexpected run state change {} -> {}", state.name(), next.name());
        }
        *state = next;
    }

    pub fn state(&self) -> RunState {
        lock(&self.state).clone()
    }

    pub fn channel_data(&self) -> ChannelData {
        lock(&self.data).clone()
    }

    pub fn xy(&self) -> Option<XyResult> {
        lock(&self.xy).clone()
    }

    fn publish(&self, bundle: ResultBundle) {
        lock(&self.data).insert(bundle);
    }

    fn set_xy(&self, xy: XyResult) {
        *lock(&self.xy) = Some(xy);
    }
}

/// What happened to one configured channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOutcome {
    pub channel: Channel,
    /// Number of samples on success
    pub result: Result<usize, ChannelError>,
    /// Resonance fit outcome, when the channel succeeded and a fit was requested
    pub fit: Option<Result<(), FitConvergenceError>>,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub channels: Vec<ChannelOutcome>,
    /// Present when the xy transform was requested
    pub xy: Option<Result<(), XyError>>,
    pub metrics: MetricsCollector,
    pub duration: Duration,
}

impl RunReport {
    pub fn outcome(&self, channel: Channel) -> Option<&Result<usize, ChannelError>> {
        self.channels
            .iter()
            .find(|o| o.channel == channel)
            .map(|o| &o.result)
    }

    pub fn succeeded(&self) -> Vec<Channel> {
        self.channels
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.channel)
            .collect()
    }

    pub fn failed(&self) -> Vec<(Channel, &ChannelError)> {
        self.channels
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.channel, e)))
            .collect()
    }

    /// Channels whose bundle exists but whose resonance fit did not converge.
    pub fn fit_failures(&self) -> Vec<(Channel, &FitConvergenceError)> {
        self.channels
            .iter()
            .filter_map(|o| match &o.fit {
                Some(Err(e)) => Some((o.channel, e)),
                _ => None,
            })
            .collect()
    }

    pub fn monitor(&self) -> RunMonitor {
        RunMonitor::new(self.metrics.clone())
    }
}

/// Body of the background acquisition task.
///
/// Always leaves `shared` in a terminal state with progress marked done.
pub async fn execute(
    config: AcquisitionConfig,
    transport: Arc<dyn InstrumentTransport>,
    shared: Arc<RunShared>,
) -> Result<RunReport, AcquisitionError> {
    let result = acquire(&config, transport.as_ref(), &shared).await;
    shared.progress.finish();

    match &result {
        Ok(report) => {
            info!(
                "run finished in {:?}: {:?}, {}/{} channels",
                report.duration,
                report.status,
                report.succeeded().len(),
                report.channels.len()
            );
            shared.transition(RunState::Completed {
                duration: Some(report.duration),
                status: report.status,
            });
        }
        Err(e) => {
            warn!("run failed: {}", e);
            shared.transition(RunState::Failed {
                error_msg: e.to_string(),
            });
        }
    }
    result
}

async fn acquire(
    config: &AcquisitionConfig,
    transport: &dyn InstrumentTransport,
    shared: &RunShared,
) -> Result<RunReport, AcquisitionError> {
    let started = Instant::now();
    info!(
        "acquiring {} channel(s) from {} via {}",
        config.channels.len(),
        config.address,
        transport.transport_id()
    );

    let inner = transport
        .open(&config.address)
        .await
        .map_err(|source| ConnectionError::Open {
            address: config.address.clone(),
            source,
        })?;
    let mut session = ManagedSession::new(config.address.clone(), inner);
    if let Err(e) = transfer::prepare(&mut session).await {
        let _ = session.close().await;
        return Err(e.into());
    }

    let plan = config.plan();
    let roles = config.xy_roles();
    let mut collector = MetricsCollector::new();
    let mut outcomes = Vec::with_capacity(config.channels.len());
    let mut xy_sources: Vec<PhysicalSeries> = Vec::new();

    for (i, &channel) in config.channels.iter().enumerate() {
        shared.progress.begin_channel(i);
        let metrics = collector.channel(channel);

        match acquire_channel(&mut session, channel, config, &plan, &shared.progress, &metrics).await {
            Ok((series, bundle)) => {
                info!(
                    "{}: {} samples at {} S/s",
                    channel,
                    series.len(),
                    series.sample_rate
                );
                let fit = bundle
                    .resonance
                    .as_ref()
                    .map(|r| r.as_ref().map(|_| ()).map_err(Clone::clone));
                outcomes.push(ChannelOutcome {
                    channel,
                    result: Ok(series.len()),
                    fit,
                });
                shared.publish(bundle);
                if roles.is_some() {
                    xy_sources.push(series);
                }
            }
            Err(e) => {
                warn!("{}: no results: {}", channel, e);
                outcomes.push(ChannelOutcome {
                    channel,
                    result: Err(e),
                    fit: None,
                });
            }
        }
    }
    let _ = session.close().await;

    let xy = roles.map(|(displacement, force)| {
        let lookup = |c: Channel| xy_sources.iter().find(|s| s.channel == c);
        match analyze_xy(displacement, force, lookup, &plan.xy) {
            Ok(result) => {
                shared.set_xy(result);
                Ok(())
            }
            Err(e) => {
                warn!("xy transform skipped: {}", e);
                Err(e)
            }
        }
    });

    Ok(RunReport {
        status: run_status(&outcomes, xy.as_ref()),
        channels: outcomes,
        xy,
        metrics: collector,
        duration: started.elapsed(),
    })
}

async fn acquire_channel(
    session: &mut ManagedSession,
    channel: Channel,
    config: &AcquisitionConfig,
    plan: &AnalysisPlan,
    progress: &Progress,
    metrics: &TransferMetrics,
) -> Result<(PhysicalSeries, ResultBundle), ChannelError> {
    let raw =
        transfer::fetch_waveform(session, channel, config.chunk_size, progress, Some(metrics)).await?;
    let series = convert(&raw, config.gain_for(channel))?;
    let bundle = analyze_channel(&series, plan)?;
    Ok((series, bundle))
}

/// Fit outcomes do not enter the status: a channel whose fit failed still has
/// its bundle.
fn run_status(outcomes: &[ChannelOutcome], xy: Option<&Result<(), XyError>>) -> RunStatus {
    let ok = outcomes.iter().filter(|o| o.result.is_ok()).count();
    let xy_ok = xy.map_or(true, |r| r.is_ok());
    if ok == 0 {
        RunStatus::Failed
    } else if ok == outcomes.len() && xy_ok {
        RunStatus::Complete
    } else {
        RunStatus::Partial
    }
}
