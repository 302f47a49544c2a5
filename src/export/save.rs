use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// `YYYYMMDD_HHMMSS` in the time zone `time` carries.
pub fn timestamp<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    time.format("%Y%m%d_%H%M%S").to_string()
}

/// Write `contents` to `<dir>/<timestamp>_data.csv`, stamped with local time,
/// and return the path.
pub fn save_csv(dir: impl AsRef<Path>, contents: &str) -> Result<PathBuf> {
    save_csv_at(dir, contents, &Local::now())
}

pub fn save_csv_at<Tz: TimeZone>(
    dir: impl AsRef<Path>,
    contents: &str,
    time: &DateTime<Tz>,
) -> Result<PathBuf>
where
    Tz::Offset: Display,
{
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    let path = dir.join(format!("{}_data.csv", timestamp(time)));
    std::fs::write(&path, contents)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
