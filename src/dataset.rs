//! Recorded drops used to calibrate the height estimator.
//!
//! The CSV layout is one row per bounce:
//! `Height,Bounce Number,Total Time,Interval Time,Total Time (ms),Interval Time (ms)`.
//! The millisecond columns may be left empty, in which case the `MM:SS.SS`
//! clock columns are parsed instead.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::util::mean;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] io::Error),
    #[error("malformed dataset: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid clock time {0:?}, expected MM:SS.SS")]
    InvalidClockTime(String),
    #[error("row {row} has no {column}")]
    MissingValue { row: usize, column: &'static str },
}

/// One bounce of one measured drop
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub height_cm: f64,
    pub bounce_number: u32,
    pub total_ms: f64,
    pub interval_ms: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Row {
    #[serde(rename = "Height")]
    height: f64,
    #[serde(rename = "Bounce Number")]
    bounce_number: u32,
    #[serde(rename = "Total Time", default)]
    total_time: Option<String>,
    #[serde(rename = "Interval Time", default)]
    interval_time: Option<String>,
    #[serde(rename = "Total Time (ms)", default)]
    total_ms: Option<f64>,
    #[serde(rename = "Interval Time (ms)", default)]
    interval_ms: Option<f64>,
}

/// "MM:SS.SS" to whole milliseconds
pub fn parse_clock_time(text: &str) -> Result<u64, DatasetError> {
    let invalid = || DatasetError::InvalidClockTime(text.to_string());
    let (minutes, seconds) = text.trim().split_once(':').ok_or_else(invalid)?;
    let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
    let seconds: f64 = seconds.parse().map_err(|_| invalid())?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }
    Ok(((minutes as f64 * 60.0 + seconds) * 1000.0).round() as u64)
}

/// Whole milliseconds to "MM:SS.SS"
pub fn format_clock_time(ms: u64) -> String {
    let centis = (ms + 5) / 10;
    format!("{:02}:{:02}.{:02}", centis / 6000, centis / 100 % 60, centis % 100)
}

fn resolve(
    ms: Option<f64>,
    clock: Option<&str>,
    row: usize,
    column: &'static str,
) -> Result<f64, DatasetError> {
    match (ms, clock.filter(|c| !c.trim().is_empty())) {
        (Some(ms), _) => Ok(ms),
        (None, Some(clock)) => Ok(parse_clock_time(clock)? as f64),
        (None, None) => Err(DatasetError::MissingValue { row, column }),
    }
}

pub fn read_samples<R: io::Read>(reader: R) -> Result<Vec<Sample>, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut samples = Vec::new();

    for (idx, row) in rdr.deserialize::<Row>().enumerate() {
        let row = row?;
        let line = idx + 1;
        samples.push(Sample {
            height_cm: row.height,
            bounce_number: row.bounce_number,
            total_ms: resolve(row.total_ms, row.total_time.as_deref(), line, "total time")?,
            interval_ms: resolve(
                row.interval_ms,
                row.interval_time.as_deref(),
                line,
                "interval time",
            )?,
        });
    }

    Ok(samples)
}

pub fn load_samples<P: AsRef<Path>>(path: P) -> Result<Vec<Sample>, DatasetError> {
    let file = std::fs::File::open(path)?;
    read_samples(file)
}

/// Appends one row, writing the header first when the file is new or empty
pub fn append_sample<P: AsRef<Path>>(path: P, sample: &Sample) -> Result<(), DatasetError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_empty = file.metadata()?.len() == 0;

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(is_empty)
        .from_writer(file);
    let total_ms = sample.total_ms.round().max(0.0) as u64;
    let interval_ms = sample.interval_ms.round().max(0.0) as u64;
    wtr.serialize(Row {
        height: sample.height_cm,
        bounce_number: sample.bounce_number,
        total_time: Some(format_clock_time(total_ms)),
        interval_time: Some(format_clock_time(interval_ms)),
        total_ms: Some(sample.total_ms),
        interval_ms: Some(sample.interval_ms),
    })?;
    wtr.flush()?;

    info!(path = %path.display(), ?sample, "sample recorded");
    Ok(())
}

/// Samples recorded at one drop height
#[derive(Debug, Clone, PartialEq)]
pub struct HeightSummary {
    pub height_cm: f64,
    pub samples: usize,
    pub max_bounce: u32,
}

/// Averages over every drop for one bounce number
#[derive(Debug, Clone, PartialEq)]
pub struct BounceSummary {
    pub bounce_number: u32,
    pub samples: usize,
    pub mean_total_ms: f64,
    pub mean_interval_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatasetSummary {
    pub samples: usize,
    pub heights: Vec<HeightSummary>,
    pub bounces: Vec<BounceSummary>,
}

/// Per-height counts and per-bounce means, both in ascending order
pub fn summarize(samples: &[Sample]) -> DatasetSummary {
    let by_height = samples
        .iter()
        .sorted_by(|a, b| a.height_cm.total_cmp(&b.height_cm))
        .chunk_by(|s| s.height_cm);
    let heights = (&by_height)
        .into_iter()
        .map(|(height_cm, group)| {
            let group = group.collect::<Vec<&Sample>>();
            HeightSummary {
                height_cm,
                samples: group.len(),
                max_bounce: group.iter().map(|s| s.bounce_number).max().unwrap_or(0),
            }
        })
        .collect();

    let by_bounce = samples
        .iter()
        .sorted_by_key(|s| s.bounce_number)
        .chunk_by(|s| s.bounce_number);
    let bounces = (&by_bounce)
        .into_iter()
        .map(|(bounce_number, group)| {
            let group = group.collect::<Vec<&Sample>>();
            let totals = group.iter().map(|s| s.total_ms).collect::<Vec<f64>>();
            let intervals = group.iter().map(|s| s.interval_ms).collect::<Vec<f64>>();
            BounceSummary {
                bounce_number,
                samples: group.len(),
                mean_total_ms: mean(&totals).unwrap_or(0.0),
                mean_interval_ms: mean(&intervals).unwrap_or(0.0),
            }
        })
        .collect();

    DatasetSummary {
        samples: samples.len(),
        heights,
        bounces,
    }
}

/// Keeps the first `max_bounce` bounces of every drop
pub fn early_bounces(samples: &[Sample], max_bounce: u32) -> Vec<Sample> {
    samples
        .iter()
        .filter(|s| s.bounce_number <= max_bounce)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const CSV: &str = "\
Height,Bounce Number,Total Time,Interval Time,Total Time (ms),Interval Time (ms)
180,1,00:00.14,00:00.14,140,140
180,2,00:00.71,00:00.57,710,570
180,5,00:03.04,00:00.86,3040,860
160,1,00:00.21,00:00.21,,
";

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(parse_clock_time("00:00.14").unwrap(), 140);
        assert_eq!(parse_clock_time("01:02.50").unwrap(), 62_500);
        assert_matches!(parse_clock_time("0.14"), Err(DatasetError::InvalidClockTime(_)));
        assert_matches!(parse_clock_time("aa:00.1"), Err(DatasetError::InvalidClockTime(_)));
    }

    #[test]
    fn test_read_samples_with_and_without_ms_columns() {
        let samples = read_samples(CSV.as_bytes()).unwrap();
        assert_eq!(samples.len(), 4);
        assert_eq!(
            samples[1],
            Sample {
                height_cm: 180.0,
                bounce_number: 2,
                total_ms: 710.0,
                interval_ms: 570.0
            }
        );
        assert_eq!(samples[3].total_ms, 210.0);
        assert_eq!(samples[3].interval_ms, 210.0);
    }

    #[test]
    fn test_missing_times_are_reported() {
        let csv = "Height,Bounce Number,Total Time,Interval Time,Total Time (ms),Interval Time (ms)\n\
                   150,1,,,,\n";
        assert_matches!(
            read_samples(csv.as_bytes()),
            Err(DatasetError::MissingValue { row: 1, column: "total time" })
        );
    }

    #[test]
    fn test_early_bounces_filter() {
        let samples = read_samples(CSV.as_bytes()).unwrap();
        let early = early_bounces(&samples, 4);
        assert_eq!(early.len(), 3);
        assert!(early.iter().all(|s| s.bounce_number <= 4));
    }

    #[test]
    fn test_format_clock_time() {
        assert_eq!(format_clock_time(140), "00:00.14");
        assert_eq!(format_clock_time(62_500), "01:02.50");
        assert_eq!(format_clock_time(3_044), "00:03.04");
        assert_eq!(parse_clock_time(&format_clock_time(710)).unwrap(), 710);
    }

    #[test]
    fn test_append_sample_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("bounces.csv");
        let first = Sample {
            height_cm: 120.0,
            bounce_number: 1,
            total_ms: 3200.0,
            interval_ms: 1500.0,
        };
        let second = Sample {
            height_cm: 95.5,
            bounce_number: 3,
            total_ms: 2100.0,
            interval_ms: 640.0,
        };
        append_sample(&path, &first).unwrap();
        append_sample(&path, &second).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("Bounce Number").count(), 1);
        assert!(text.contains("120.0,1,00:03.20,00:01.50,3200.0,1500.0"));
        assert_eq!(load_samples(&path).unwrap(), vec![first, second]);
    }

    #[test]
    fn test_append_sample_to_existing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bounces.csv");
        std::fs::write(&path, CSV).unwrap();

        let sample = Sample {
            height_cm: 160.0,
            bounce_number: 2,
            total_ms: 1140.0,
            interval_ms: 930.0,
        };
        append_sample(&path, &sample).unwrap();

        let samples = load_samples(&path).unwrap();
        assert_eq!(samples.len(), 5);
        assert_eq!(samples.last(), Some(&sample));
    }

    #[test]
    fn test_summarize_groups_by_height_and_bounce() {
        let samples = read_samples(CSV.as_bytes()).unwrap();
        let summary = summarize(&samples);
        assert_eq!(summary.samples, 4);

        assert_eq!(
            summary.heights,
            vec![
                HeightSummary {
                    height_cm: 160.0,
                    samples: 1,
                    max_bounce: 1
                },
                HeightSummary {
                    height_cm: 180.0,
                    samples: 3,
                    max_bounce: 5
                },
            ]
        );

        let numbers = summary.bounces.iter().map(|b| b.bounce_number).collect::<Vec<u32>>();
        assert_eq!(numbers, vec![1, 2, 5]);
        let first = &summary.bounces[0];
        assert_eq!(first.samples, 2);
        assert!((first.mean_total_ms - 175.0).abs() < 1e-9);
        assert!((first.mean_interval_ms - 175.0).abs() < 1e-9);

        assert_eq!(summarize(&[]), DatasetSummary::default());
    }

    #[test]
    fn test_load_samples_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bounces.csv");
        std::fs::write(&path, CSV).unwrap();
        assert_eq!(load_samples(&path).unwrap().len(), 4);
        assert_matches!(
            load_samples(dir.path().join("missing.csv")),
            Err(DatasetError::Io(_))
        );
    }
}
