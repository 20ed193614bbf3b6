use serde::Serialize;

use crate::constants::{ASSUMED_SECONDS_PER_SECTION, PARALLEL_OVERHEAD_FACTOR};

/// Rough wall-clock comparison of sequential and pooled drafting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedupEstimate {
    pub num_sections: usize,
    pub max_workers: usize,
    pub sequential_seconds: f64,
    pub parallel_seconds: f64,
    pub speedup: f64,
    pub time_saved_seconds: f64,
}

impl SpeedupEstimate {
    pub fn time_saved_minutes(&self) -> f64 {
        self.time_saved_seconds / 60.0
    }

    /// Format the estimate for display
    pub fn format(&self) -> String {
        format!(
            "Drafting {} sections with {} workers:\n\
            Sequential: {:.0}s\n\
            Parallel:   {:.0}s\n\
            Speedup:    {:.2}x (saves {:.1} min)",
            self.num_sections,
            self.max_workers,
            self.sequential_seconds,
            self.parallel_seconds,
            self.speedup,
            self.time_saved_minutes()
        )
    }
}

/// Estimate the speedup of drafting `num_sections` on `max_workers` workers
///
/// Assumes a fixed time per section and a flat overhead on the pooled run.
pub fn estimate_speedup(num_sections: usize, max_workers: usize) -> SpeedupEstimate {
    let max_workers = max_workers.max(1);
    let sequential_seconds = num_sections as f64 * ASSUMED_SECONDS_PER_SECTION;

    let rounds = num_sections.div_ceil(max_workers);
    let parallel_seconds = rounds as f64 * ASSUMED_SECONDS_PER_SECTION * PARALLEL_OVERHEAD_FACTOR;

    let speedup = if parallel_seconds > 0.0 {
        sequential_seconds / parallel_seconds
    } else {
        1.0
    };

    SpeedupEstimate {
        num_sections,
        max_workers,
        sequential_seconds,
        parallel_seconds,
        speedup,
        time_saved_seconds: sequential_seconds - parallel_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_speedup() {
        let estimate = estimate_speedup(6, 3);

        assert_eq!(estimate.sequential_seconds, 360.0);
        assert!((estimate.parallel_seconds - 132.0).abs() < 1e-9);
        assert!((estimate.speedup - 360.0 / 132.0).abs() < 1e-9);
        assert!((estimate.time_saved_seconds - 228.0).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_no_sections() {
        let estimate = estimate_speedup(0, 3);
        assert_eq!(estimate.speedup, 1.0);
        assert_eq!(estimate.time_saved_seconds, 0.0);
    }

    #[test]
    fn test_estimate_partial_round() {
        // 4 sections on 3 workers still needs two rounds
        let estimate = estimate_speedup(4, 3);
        assert!((estimate.parallel_seconds - 132.0).abs() < 1e-9);
    }
}
