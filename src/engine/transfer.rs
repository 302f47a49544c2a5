//! Chunked waveform transfer.
//!
//! The digitizer only hands out bounded `SEND?` windows, so a record of `L`
//! samples is pulled as `ceil(L / chunk_size)` consecutive blocks. Range and
//! offset are read after the last block because the instrument may have
//! adjusted them while the transfer was running.

use log::debug;

use super::Progress;
use crate::core::{Channel, ConnectionError, RawWaveform, TransferError};
use crate::hal::{commands, reply, ManagedSession};
use crate::observability::TransferMetrics;

/// Send the once-per-run setup sequence.
pub async fn prepare(session: &mut ManagedSession) -> Result<(), ConnectionError> {
    for command in commands::SETUP {
        session
            .write(command)
            .await
            .map_err(|source| ConnectionError::Setup {
                command: command.to_string(),
                source,
            })?;
    }
    Ok(())
}

/// Pull the complete record of `channel`.
///
/// `progress` receives `(i + 1) / n` after chunk `i` of `n`. Nothing is
/// returned unless every sample arrived.
pub async fn fetch_waveform(
    session: &mut ManagedSession,
    channel: Channel,
    chunk_size: usize,
    progress: &Progress,
    metrics: Option<&TransferMetrics>,
) -> Result<RawWaveform, TransferError> {
    let result = transfer(session, channel, chunk_size.max(1), progress, metrics).await;
    if result.is_err() {
        if let Some(metrics) = metrics {
            metrics.record_failure();
        }
    }
    result
}

async fn transfer(
    session: &mut ManagedSession,
    channel: Channel,
    chunk_size: usize,
    progress: &Progress,
    metrics: Option<&TransferMetrics>,
) -> Result<RawWaveform, TransferError> {
    write(session, channel, &commands::select_trace(channel.number())).await?;
    let min_record = query_number(session, channel, commands::RECORD_MIN_QUERY).await?;
    write(session, channel, &commands::select_record(min_record as i64)).await?;

    let length = query_count(session, channel, commands::LENGTH_QUERY).await?;
    let sample_rate = query_number(session, channel, commands::SRATE_QUERY).await?;

    let n_chunks = length.div_ceil(chunk_size);
    // Grown per chunk: `length` is only what the instrument claims
    let mut codes: Vec<i16> = Vec::new();
    if n_chunks == 0 {
        progress.set_fraction(1.0);
    }

    for i in 0..n_chunks {
        let start = i * chunk_size;
        let end = length.min(start + chunk_size) - 1;
        write(session, channel, &commands::window(start, end)).await?;

        let clock = metrics.map(|m| m.start_chunk());
        let block = session
            .query_binary(commands::SEND_QUERY)
            .await
            .map_err(|source| TransferError::Command {
                channel,
                command: commands::SEND_QUERY.to_string(),
                source,
            })?;
        if let (Some(m), Some(clock)) = (metrics, clock) {
            m.finish_chunk(clock, block.len());
        }
        debug!(
            "{}: chunk {}/{} [{}, {}] -> {} samples",
            channel,
            i + 1,
            n_chunks,
            start,
            end,
            block.len()
        );

        if codes.len() + block.len() > length {
            return Err(TransferError::LengthMismatch {
                channel,
                expected: length,
                actual: codes.len() + block.len(),
            });
        }
        codes.extend_from_slice(&block);
        progress.set_fraction((i + 1) as f64 / n_chunks as f64);
    }

    if codes.len() != length {
        return Err(TransferError::LengthMismatch {
            channel,
            expected: length,
            actual: codes.len(),
        });
    }

    let offset = query_number(session, channel, commands::OFFSET_QUERY).await?;
    let range = query_number(session, channel, commands::RANGE_QUERY).await?;

    Ok(RawWaveform {
        channel,
        codes,
        sample_rate,
        range,
        offset,
    })
}

async fn write(
    session: &mut ManagedSession,
    channel: Channel,
    command: &str,
) -> Result<(), TransferError> {
    session
        .write(command)
        .await
        .map_err(|source| TransferError::Command {
            channel,
            command: command.to_string(),
            source,
        })
}

async fn query(
    session: &mut ManagedSession,
    channel: Channel,
    command: &str,
) -> Result<String, TransferError> {
    session
        .query(command)
        .await
        .map_err(|source| TransferError::Command {
            channel,
            command: command.to_string(),
            source,
        })
}

async fn query_number(
    session: &mut ManagedSession,
    channel: Channel,
    command: &str,
) -> Result<f64, TransferError> {
    let answer = query(session, channel, command).await?;
    reply::parse_number(&answer).ok_or_else(|| TransferError::MalformedReply {
        channel,
        command: command.to_string(),
        reply: answer,
    })
}

async fn query_count(
    session: &mut ManagedSession,
    channel: Channel,
    command: &str,
) -> Result<usize, TransferError> {
    let answer = query(session, channel, command).await?;
    reply::parse_count(&answer).ok_or_else(|| TransferError::MalformedReply {
        channel,
        command: command.to_string(),
        reply: answer,
    })
}
