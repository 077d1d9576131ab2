//! Completion-time statistics for repeated harness runs.
//!
//! The interval is the usual small-sample one:
//! `mean ± t(0.975, n-1) · s / √n`, with `s` the sample standard deviation.

use std::fmt;

/// Two-sided 95% Student-t critical values for 1..=30 degrees of freedom.
const T_975: [f64; 30] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, //
    2.201, 2.179, 2.160, 2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, //
    2.080, 2.074, 2.069, 2.064, 2.060, 2.056, 2.052, 2.048, 2.045, 2.042,
];

/// Normal approximation used past the table.
const Z_975: f64 = 1.96;

/// Critical value for a 95% two-sided interval.
pub fn t_critical(degrees_of_freedom: usize) -> f64 {
    match degrees_of_freedom {
        0 => 0.0,
        df if df <= T_975.len() => T_975[df - 1],
        _ => Z_975,
    }
}

/// Mean and 95% confidence interval of a set of samples (seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl CompletionStats {
    /// Summarize `samples`.
    ///
    /// An empty slice gives all zeros; fewer than two samples give a
    /// zero-width interval around the mean.
    pub fn from_samples(samples: &[f64]) -> Self {
        let count = samples.len();
        if count == 0 {
            return Self {
                count: 0,
                mean: 0.0,
                std_dev: 0.0,
                ci_lower: 0.0,
                ci_upper: 0.0,
            };
        }

        let mean = samples.iter().sum::<f64>() / count as f64;

        let std_dev = if count < 2 {
            0.0
        } else {
            let variance =
                samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            variance.sqrt()
        };

        let half_width = if count < 2 {
            0.0
        } else {
            t_critical(count - 1) * std_dev / (count as f64).sqrt()
        };

        Self {
            count,
            mean,
            std_dev,
            ci_lower: mean - half_width,
            ci_upper: mean + half_width,
        }
    }

    /// Half the interval width.
    pub fn margin(&self) -> f64 {
        (self.ci_upper - self.ci_lower) / 2.0
    }
}

impl fmt::Display for CompletionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4}s (95% CI: {:.4}s to {:.4}s, n={})",
            self.mean, self.ci_lower, self.ci_upper, self.count
        )
    }
}
