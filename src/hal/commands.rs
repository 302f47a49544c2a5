//! Fixed command set of the DL850E-class digitizer waveform interface.

/// Stop acquisition so the record stays stable during transfer.
pub const STOP: &str = ":STOP";
/// 16-bit signed words.
pub const FORMAT_WORD: &str = ":WAVEFORM:FORMAT WORD";
/// Little-endian words.
pub const BYTEORDER_LSB: &str = ":WAVEFORM:BYTEORDER LSBFIRST";

pub const RECORD_MIN_QUERY: &str = ":WAVEFORM:RECORD? MINIMUM";
pub const LENGTH_QUERY: &str = ":WAVEFORM:LENGTH?";
pub const SRATE_QUERY: &str = ":WAVEFORM:SRATE?";
pub const SEND_QUERY: &str = ":WAVEFORM:SEND?";
pub const OFFSET_QUERY: &str = ":WAVEFORM:OFFSET?";
pub const RANGE_QUERY: &str = ":WAVEFORM:RANGE?";

/// Setup sequence sent once per run, before any channel is selected.
pub const SETUP: [&str; 3] = [STOP, FORMAT_WORD, BYTEORDER_LSB];

pub fn select_trace(channel: u32) -> String {
    format!(":WAVEFORM:TRACE {}", channel)
}

pub fn select_record(record: i64) -> String {
    format!(":WAVEFORM:RECORD {}", record)
}

/// Inclusive sample window for the next `SEND?`.
pub fn window(start: usize, end: usize) -> String {
    format!(":WAVEFORM:START {};:WAVEFORM:END {}", start, end)
}
