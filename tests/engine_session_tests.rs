use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use scopetab::analysis::{AnalysisMode, ModeSet};
use scopetab::core::{
    AcquisitionError, Channel, ChannelError, ConfigError, ConnectionError, FitConvergenceError, SeriesKey,
    TransferError,
};
use scopetab::engine::{AcquisitionConfig, AcquisitionSession, RunState, RunStatus};
use scopetab::export::ExportOptions;
use scopetab::hal::mock::{SimulatedScope, SimulatedTrace, SimulatedTransport};
use scopetab::hal::InstrumentTransport;

const ADDRESS: &str = "TCPIP0::10.0.0.7::inst0::INSTR";

fn trace(len: usize, freq: f64) -> SimulatedTrace {
    let volts: Vec<f64> = (0..len)
        .map(|i| 2.0 * (2.0 * PI * freq * i as f64 / 1000.0).sin())
        .collect();
    SimulatedTrace::from_volts(&volts, 1000.0, 5.0, 0.0)
}

fn three_channel_scope() -> SimulatedScope {
    SimulatedScope::new()
        .with_trace(Channel(1), trace(2500, 10.0))
        .with_trace(Channel(2), trace(1800, 20.0))
        .with_trace(Channel(3), trace(1200, 30.0))
}

fn config(channels: &[u32], modes: &[AnalysisMode]) -> AcquisitionConfig {
    let mut config = AcquisitionConfig::new(
        ADDRESS,
        channels.iter().map(|&c| Channel(c)).collect(),
        modes.iter().copied().collect::<ModeSet>(),
    );
    config.chunk_size = 1000;
    config
}

fn transport(scope: SimulatedScope) -> Arc<SimulatedTransport> {
    Arc::new(SimulatedTransport::new().with_instrument(ADDRESS, scope))
}

#[tokio::test]
async fn test_complete_run() {
    let scope = three_channel_scope();
    let log = scope.log();
    let transport = transport(scope);
    let mut session =
        AcquisitionSession::new(config(&[1, 2, 3], &[AnalysisMode::TimeDomain, AnalysisMode::FrequencyDomain])).unwrap();

    let report = session.run(transport).await.unwrap();

    assert_eq!(report.status, RunStatus::Complete);
    assert_eq!(report.succeeded(), vec![Channel(1), Channel(2), Channel(3)]);
    assert_eq!(report.outcome(Channel(2)), Some(&Ok(1800)));

    let data = session.channel_data();
    assert_eq!(data.channels(), vec![Channel(1), Channel(2), Channel(3)]);
    assert_eq!(data.get(Channel(3)).unwrap().get(SeriesKey::Voltage).unwrap().len(), 1200);

    let progress = session.progress();
    assert!(progress.done);
    assert_eq!(progress.overall(), 1.0);
    assert!(matches!(session.state(), RunState::Completed { status: RunStatus::Complete, .. }));

    let snapshot = report.metrics.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[0].chunks_requested, 3);
    assert_eq!(snapshot[0].samples_received, 2500);
    assert!(log.lock().unwrap().closed);
}

#[tokio::test]
async fn test_failed_channel_is_isolated() {
    let transport = transport(three_channel_scope().fail_transfer(Channel(2), 1));
    let mut session = AcquisitionSession::new(config(&[1, 2, 3], &[AnalysisMode::TimeDomain])).unwrap();

    let report = session.run(transport).await.unwrap();

    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.succeeded(), vec![Channel(1), Channel(3)]);
    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, Channel(2));
    assert!(matches!(failed[0].1, ChannelError::Transfer(_)));

    let data = session.channel_data();
    assert!(data.contains(Channel(1)));
    assert!(!data.contains(Channel(2)));
    assert!(data.contains(Channel(3)));
    assert_eq!(data.get(Channel(1)).unwrap().get(SeriesKey::Time).unwrap().len(), 2500);
    assert_eq!(data.get(Channel(3)).unwrap().get(SeriesKey::Time).unwrap().len(), 1200);
    assert_eq!(report.metrics.get(Channel(2)).unwrap().failures(), 1);
}

#[tokio::test]
async fn test_unusable_length_reply_is_isolated() {
    let scope = three_channel_scope().with_length_reply(Channel(1), ":WAVEFORM:LENGTH 1E+30");
    let mut session = AcquisitionSession::new(config(&[1, 2, 3], &[AnalysisMode::TimeDomain])).unwrap();

    let report = session.run(transport(scope)).await.unwrap();

    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.succeeded(), vec![Channel(2), Channel(3)]);
    assert!(matches!(
        report.outcome(Channel(1)),
        Some(Err(ChannelError::Transfer(TransferError::MalformedReply { .. })))
    ));
    assert!(session.progress().done);
    assert!(matches!(session.state(), RunState::Completed { status: RunStatus::Partial, .. }));
}

#[tokio::test]
async fn test_fit_failure_is_reported_per_channel() {
    let mut config = config(&[1, 2], &[AnalysisMode::Resonance]);
    config.fit.max_iterations = 0;
    let mut session = AcquisitionSession::new(config).unwrap();

    let report = session.run(transport(three_channel_scope())).await.unwrap();

    assert_eq!(report.status, RunStatus::Complete);
    let fit_failures = report.fit_failures();
    assert_eq!(fit_failures.len(), 2);
    assert_eq!(fit_failures[0].0, Channel(1));
    assert!(matches!(fit_failures[0].1, FitConvergenceError::IterationLimit { .. }));
    assert!(session.channel_data().get(Channel(2)).unwrap().get(SeriesKey::Acceleration).is_some());
}

#[tokio::test]
async fn test_xy_with_three_channels_rejected_before_io() {
    let transport = transport(three_channel_scope());
    let mut config = config(&[1, 2], &[AnalysisMode::XyTransform]);
    config.channels.push(Channel(3));

    let result = AcquisitionSession::new(config);

    assert!(matches!(
        result,
        Err(AcquisitionError::Config(ConfigError::XyChannelCount(3)))
    ));
    assert_eq!(transport.open_count(), 0);
}

#[tokio::test]
async fn test_xy_run() {
    let transport = transport(three_channel_scope());
    let mut session = AcquisitionSession::new(config(&[1, 2], &[AnalysisMode::XyTransform])).unwrap();

    let report = session.run(transport).await.unwrap();

    assert_eq!(report.xy, Some(Ok(())));
    let xy = session.xy().unwrap();
    assert_eq!(xy.len(), 1800);
    assert_eq!(xy.displacement_channel, Channel(1));
    assert!(xy.distance_mm.iter().all(|&d| d >= 0.0));

    let csv = session.export_csv(&ExportOptions::default());
    let header = csv.lines().next().unwrap();
    assert_eq!(header, "ch1:t_volt,ch2:t_volt,xy:distance_mm,xy:force_n");
}

#[tokio::test]
async fn test_xy_display_decimation_from_config() {
    let transport = transport(three_channel_scope());
    let mut config = config(&[1, 2], &[AnalysisMode::XyTransform]);
    config.xy.decimation = 200;
    let mut session = AcquisitionSession::new(config).unwrap();

    session.run(transport).await.unwrap();

    let xy = session.xy().unwrap();
    let (distance, force) = xy.display_trace();
    assert_eq!(xy.display_decimation, 200);
    assert_eq!(distance.len(), 9);
    assert_eq!(force.len(), 9);
}

#[tokio::test]
async fn test_xy_missing_source_is_partial() {
    let transport = transport(three_channel_scope().fail_transfer(Channel(2), 0));
    let mut session = AcquisitionSession::new(config(&[1, 2], &[AnalysisMode::XyTransform])).unwrap();

    let report = session.run(transport).await.unwrap();

    assert_eq!(report.status, RunStatus::Partial);
    assert!(matches!(report.xy, Some(Err(_))));
    assert!(session.xy().is_none());
}

#[tokio::test]
async fn test_connection_failure_leaves_no_data() {
    let transport: Arc<dyn InstrumentTransport> = Arc::new(SimulatedTransport::new());
    let mut session = AcquisitionSession::new(config(&[1], &[AnalysisMode::TimeDomain])).unwrap();

    let err = session.run(transport).await.unwrap_err();

    assert!(matches!(err, AcquisitionError::Connection(ConnectionError::Open { .. })));
    assert!(session.channel_data().is_empty());
    assert!(matches!(session.state(), RunState::Failed { .. }));
}

#[tokio::test]
async fn test_setup_failure_is_fatal() {
    let transport = transport(three_channel_scope().fail_command(":STOP"));
    let mut session = AcquisitionSession::new(config(&[1, 2], &[AnalysisMode::TimeDomain])).unwrap();

    let err = session.run(transport).await.unwrap_err();

    assert!(matches!(err, AcquisitionError::Connection(ConnectionError::Setup { .. })));
    assert!(session.channel_data().is_empty());
}

#[tokio::test]
async fn test_new_run_resets_previous_results() {
    let mut session = AcquisitionSession::new(config(&[1, 2], &[AnalysisMode::TimeDomain])).unwrap();

    let report = session.run(transport(three_channel_scope())).await.unwrap();
    assert_eq!(report.status, RunStatus::Complete);
    assert_eq!(session.channel_data().len(), 2);

    let failing = transport(three_channel_scope().fail_transfer(Channel(1), 0).fail_transfer(Channel(2), 0));
    let report = session.run(failing).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert!(session.channel_data().is_empty());
}

#[tokio::test]
async fn test_single_run_in_flight() {
    let scope = three_channel_scope().with_latency(Duration::from_millis(50));
    let transport = transport(scope);
    let mut session = AcquisitionSession::new(config(&[1, 2, 3], &[AnalysisMode::TimeDomain])).unwrap();

    session.start(transport.clone()).unwrap();
    assert!(session.is_running());
    assert!(matches!(session.start(transport), Err(AcquisitionError::RunInProgress)));

    let mut last = 0.0;
    while session.is_running() {
        let overall = session.progress().overall();
        assert!(overall >= last);
        last = overall;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let report = session.wait().await.unwrap();
    assert_eq!(report.status, RunStatus::Complete);
    assert!(matches!(session.wait().await, Err(AcquisitionError::NotStarted)));
}

#[tokio::test]
async fn test_save_results() -> anyhow::Result<()> {
    let mut session = AcquisitionSession::new(config(&[3], &[AnalysisMode::TimeDomain]))?;
    session.run(transport(three_channel_scope())).await?;

    let dir = tempfile::tempdir()?;
    let path = session.save_csv(dir.path(), &ExportOptions::default())?;

    let text = std::fs::read_to_string(&path)?;
    assert!(text.starts_with("ch3:t,ch3:t_volt\n"));
    assert_eq!(text.lines().count(), 1201);
    Ok(())
}
