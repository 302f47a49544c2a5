use std::sync::{Arc, Mutex};

use scopetab::core::{Channel, ConnectionError, SessionError, TransferError};
use scopetab::engine::transfer::{fetch_waveform, prepare};
use scopetab::engine::Progress;
use scopetab::hal::commands;
use scopetab::hal::mock::{SimulatedScope, SimulatedTrace};
use scopetab::hal::ManagedSession;
use scopetab::observability::TransferMetrics;

fn ramp(len: usize) -> Vec<i16> {
    (0..len).map(|i| (i % 20_000) as i16 - 10_000).collect()
}

fn scope_with(len: usize) -> SimulatedScope {
    SimulatedScope::new().with_trace(Channel(1), SimulatedTrace::new(ramp(len), 1e4, 5.0, 0.1))
}

#[tokio::test]
async fn test_reconstructs_exact_length() {
    for (len, chunk) in [(1, 1), (10, 3), (12, 4), (1000, 999), (1000, 1000), (1000, 5000), (25_001, 10_000)] {
        let scope = scope_with(len);
        let log = scope.log();
        let mut session = ManagedSession::new("sim", Box::new(scope));
        let progress = Progress::new();

        let raw = fetch_waveform(&mut session, Channel(1), chunk, &progress, None)
            .await
            .unwrap();

        assert_eq!(raw.codes, ramp(len), "len={} chunk={}", len, chunk);
        assert_eq!(log.lock().unwrap().sends_for(Channel(1)), len.div_ceil(chunk));
        assert_eq!(progress.snapshot().fraction, 1.0);
    }
}

#[tokio::test]
async fn test_empty_record() {
    let scope = scope_with(0);
    let log = scope.log();
    let mut session = ManagedSession::new("sim", Box::new(scope));
    let progress = Progress::new();

    let raw = fetch_waveform(&mut session, Channel(1), 100, &progress, None)
        .await
        .unwrap();

    assert!(raw.is_empty());
    assert_eq!(log.lock().unwrap().sends_for(Channel(1)), 0);
    assert_eq!(progress.snapshot().fraction, 1.0);
}

#[tokio::test]
async fn test_progress_is_monotonic() {
    let progress = Arc::new(Progress::new());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let probe_progress = progress.clone();
    let probe_seen = seen.clone();
    let scope = scope_with(1000).with_probe(move || {
        probe_seen
            .lock()
            .unwrap()
            .push(probe_progress.snapshot().fraction);
    });
    let mut session = ManagedSession::new("sim", Box::new(scope));

    fetch_waveform(&mut session, Channel(1), 300, &progress, None)
        .await
        .unwrap();

    let mut fractions = seen.lock().unwrap().clone();
    fractions.push(progress.snapshot().fraction);
    assert_eq!(fractions, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
}

#[tokio::test]
async fn test_command_sequence() {
    let scope = scope_with(5);
    let log = scope.log();
    let mut session = ManagedSession::new("sim", Box::new(scope));

    prepare(&mut session).await.unwrap();
    let raw = fetch_waveform(&mut session, Channel(1), 3, &Progress::new(), None)
        .await
        .unwrap();
    assert_eq!(raw.range, 5.0);
    assert_eq!(raw.offset, 0.1);
    assert_eq!(raw.sample_rate, 1e4);

    let log = log.lock().unwrap();
    assert_eq!(
        log.commands,
        vec![
            ":STOP",
            ":WAVEFORM:FORMAT WORD",
            ":WAVEFORM:BYTEORDER LSBFIRST",
            ":WAVEFORM:TRACE 1",
            ":WAVEFORM:RECORD? MINIMUM",
            ":WAVEFORM:RECORD 0",
            ":WAVEFORM:LENGTH?",
            ":WAVEFORM:SRATE?",
            ":WAVEFORM:START 0;:WAVEFORM:END 2",
            ":WAVEFORM:SEND?",
            ":WAVEFORM:START 3;:WAVEFORM:END 4",
            ":WAVEFORM:SEND?",
            ":WAVEFORM:OFFSET?",
            ":WAVEFORM:RANGE?",
        ]
    );
    assert_eq!(log.send_requests, vec![(Channel(1), 0, 2), (Channel(1), 3, 4)]);
}

#[tokio::test]
async fn test_failed_chunk_aborts_channel() {
    let scope = scope_with(100).fail_transfer(Channel(1), 2);
    let mut session = ManagedSession::new("sim", Box::new(scope));
    let metrics = TransferMetrics::new(Channel(1));

    let err = fetch_waveform(&mut session, Channel(1), 30, &Progress::new(), Some(&metrics))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransferError::Command {
            channel: Channel(1),
            command: commands::SEND_QUERY.to_string(),
            source: SessionError::Timeout,
        }
    );
    assert_eq!(metrics.chunks_requested(), 3);
    assert_eq!(metrics.samples_received(), 60);
    assert_eq!(metrics.failures(), 1);
}

#[tokio::test]
async fn test_chunk_larger_than_transfer_buffer() {
    let scope = scope_with(100).with_max_block(50);
    let mut session = ManagedSession::new("sim", Box::new(scope));

    let err = fetch_waveform(&mut session, Channel(1), 80, &Progress::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransferError::Command { source: SessionError::Rejected { .. }, .. }
    ));
}

#[tokio::test]
async fn test_setup_failure() {
    let scope = scope_with(10).fail_command(":WAVEFORM:BYTEORDER");
    let mut session = ManagedSession::new("sim", Box::new(scope));

    let err = prepare(&mut session).await.unwrap_err();
    assert!(matches!(err, ConnectionError::Setup { ref command, .. } if command == commands::BYTEORDER_LSB));
}

#[tokio::test]
async fn test_oversized_length_reply_is_malformed() {
    let scope = scope_with(10).with_length_reply(Channel(1), ":WAVEFORM:LENGTH 1E+30");
    let log = scope.log();
    let mut session = ManagedSession::new("sim", Box::new(scope));
    let metrics = TransferMetrics::new(Channel(1));

    let err = fetch_waveform(&mut session, Channel(1), 100_000, &Progress::new(), Some(&metrics))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransferError::MalformedReply {
            channel: Channel(1),
            command: commands::LENGTH_QUERY.to_string(),
            reply: ":WAVEFORM:LENGTH 1E+30".to_string(),
        }
    );
    assert_eq!(log.lock().unwrap().sends_for(Channel(1)), 0);
    assert_eq!(metrics.failures(), 1);
}

#[tokio::test]
async fn test_overstated_length_fails_without_panicking() {
    let scope = scope_with(10).with_length_reply(Channel(1), "4294967295");
    let mut session = ManagedSession::new("sim", Box::new(scope));

    let err = fetch_waveform(&mut session, Channel(1), 100_000, &Progress::new(), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TransferError::Command { source: SessionError::Rejected { .. }, .. }
    ));
}
