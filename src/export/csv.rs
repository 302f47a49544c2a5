//! Rectangular CSV rendering of ragged per-channel results.
//!
//! Columns are the cross product of channels (in published order) and the
//! union of series keys (in first-seen order), headed `<channel>:<key>`. The
//! xy transform, when present, adds an `xy:` group after the channels. Rows
//! run to the longest series; cells past the end of a shorter series hold the
//! missing-value marker.

use crate::analysis::XyResult;
use crate::core::{ChannelData, SeriesKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub separator: String,
    /// Written for cells past the end of a series; never a number
    pub missing: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            separator: ",".to_string(),
            missing: String::new(),
        }
    }
}

/// Union of the series keys of every bundle, in first-seen order.
pub fn series_keys(data: &ChannelData) -> Vec<SeriesKey> {
    let mut keys: Vec<SeriesKey> = Vec::new();
    for (_, bundle) in data.iter() {
        for key in bundle.keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

pub fn to_csv(data: &ChannelData, xy: Option<&XyResult>, options: &ExportOptions) -> String {
    let keys = series_keys(data);

    let mut headers: Vec<String> = Vec::new();
    let mut columns: Vec<&[f64]> = Vec::new();
    for (channel, bundle) in data.iter() {
        for &key in &keys {
            headers.push(format!("{}:{}", channel, key));
            columns.push(bundle.get(key).unwrap_or(&[]));
        }
    }
    if let Some(xy) = xy {
        headers.push(format!("xy:{}", SeriesKey::Distance));
        columns.push(&xy.distance_mm);
        headers.push(format!("xy:{}", SeriesKey::Force));
        columns.push(&xy.force_n);
    }

    let rows = columns.iter().map(|c| c.len()).max().unwrap_or(0);
    let mut out = headers.join(&options.separator);
    out.push('\n');

    let mut cells: Vec<String> = Vec::with_capacity(columns.len());
    for i in 0..rows {
        cells.clear();
        cells.extend(columns.iter().map(|column| match column.get(i) {
            Some(value) => value.to_string(),
            None => options.missing.clone(),
        }));
        out.push_str(&cells.join(&options.separator));
        out.push('\n');
    }
    out
}
