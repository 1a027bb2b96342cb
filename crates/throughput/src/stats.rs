use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StatsError;
use crate::scale::DownScale;

/// Summary of one benchmark run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub down_scale: f64,
    pub n_gpu: usize,
    /// Wall-clock seconds of the dispatch that produced the results.
    pub duration: f64,
    pub characters_per_second: u64,
    /// Projected seconds for the full corpus at the same rate (`duration / down_scale`).
    pub extrapolated_duration: u64,
    pub extrapolated_duration_fmt: String,
    /// Projected full-corpus time from the measured character rate.
    pub extrapolated_duration_tps_fmt: String,
}

/// Derive run statistics from the total characters embedded and the dispatch
/// wall-clock time.
///
/// Rates and projections are floored to whole units.
pub fn compute_statistics(
    total_chars: u64,
    duration: Duration,
    down_scale: f64,
    corpus_chars: u64,
    n_gpu: usize,
) -> Result<RunStatistics, StatsError> {
    let scale = DownScale::new(down_scale)?;
    let secs = duration.as_secs_f64();
    if secs <= 0.0 {
        return Err(StatsError::ZeroDuration);
    }

    let characters_per_second = (total_chars as f64 / secs).floor() as u64;
    if characters_per_second == 0 {
        return Err(StatsError::NoThroughput {
            total_chars,
            duration_secs: secs,
        });
    }
    let extrapolated_duration = (secs / scale.get()).floor() as u64;
    let tps_secs = corpus_chars / characters_per_second;

    Ok(RunStatistics {
        down_scale: scale.get(),
        n_gpu,
        duration: secs,
        characters_per_second,
        extrapolated_duration,
        extrapolated_duration_fmt: format_hms(extrapolated_duration),
        extrapolated_duration_tps_fmt: format_hms(tps_secs),
    })
}

/// `H:MM:SS`; hours are not wrapped into days.
pub fn format_hms(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worked_example() {
        let stats = compute_statistics(50_000, Duration::from_secs(10), 0.001, 50_000_000, 6)
            .unwrap();
        assert_eq!(stats.characters_per_second, 5000);
        assert_eq!(stats.extrapolated_duration, 10_000);
        assert_eq!(stats.extrapolated_duration_fmt, "2:46:40");
        assert_eq!(stats.extrapolated_duration_tps_fmt, "2:46:40");
        assert_eq!(stats.n_gpu, 6);
        assert_eq!(stats.duration, 10.0);
    }

    #[test]
    fn rates_are_floored() {
        let stats =
            compute_statistics(10_001, Duration::from_millis(3000), 1.0, 10_001, 1).unwrap();
        assert_eq!(stats.characters_per_second, 3333);
        assert_eq!(stats.extrapolated_duration, 3);
        assert_eq!(stats.extrapolated_duration_tps_fmt, "0:00:03");
    }

    #[test]
    fn invalid_scale_is_rejected() {
        for scale in [0.0, 1.5] {
            let err = compute_statistics(1000, Duration::from_secs(1), scale, 1000, 1).unwrap_err();
            assert_eq!(err, StatsError::InvalidScale(scale));
        }
    }

    #[test]
    fn zero_rate_has_no_extrapolation() {
        let err = compute_statistics(5, Duration::from_secs(10), 1.0, 100, 1).unwrap_err();
        assert!(matches!(err, StatsError::NoThroughput { total_chars: 5, .. }));

        let err = compute_statistics(5, Duration::ZERO, 1.0, 100, 1).unwrap_err();
        assert_eq!(err, StatsError::ZeroDuration);
    }

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(0), "0:00:00");
        assert_eq!(format_hms(59), "0:00:59");
        assert_eq!(format_hms(3661), "1:01:01");
        assert_eq!(format_hms(10_000), "2:46:40");
        assert_eq!(format_hms(100 * 3600 + 5), "100:00:05");
    }

    #[test]
    fn serializes_flat() {
        let stats =
            compute_statistics(50_000, Duration::from_secs(10), 0.001, 50_000_000, 6).unwrap();
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["down_scale"], 0.001);
        assert_eq!(value["characters_per_second"], 5000);
        assert_eq!(value["extrapolated_duration_fmt"], "2:46:40");
    }
}
