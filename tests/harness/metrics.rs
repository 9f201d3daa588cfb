// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome tallies for abuse simulation runs.

use std::collections::HashMap;
use std::time::Duration;

/// Collects outcomes during a simulation.
#[derive(Debug, Default)]
pub struct AttackMetrics {
    /// Count of requests by outcome
    outcomes: HashMap<Outcome, usize>,
    /// Count of requests by client
    requests_per_ip: HashMap<String, usize>,
    /// Count of requests by section argument
    requests_per_section: HashMap<String, usize>,
    /// Latency samples (microseconds)
    latencies: Vec<u64>,
}

/// Possible outcomes for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Reached the cache or the upstream
    Allowed,
    /// Rejected with -32000 by the client-wide counter
    RateLimitedGlobal,
    /// Rejected with -32000 by the section counter
    RateLimitedSection,
    /// Rejected with -32602 by the validator
    InvalidParams,
}

impl AttackMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request outcome.
    pub fn record(&mut self, outcome: Outcome, ip: &str, section: &str, latency: Duration) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        *self.requests_per_ip.entry(ip.to_string()).or_insert(0) += 1;
        *self.requests_per_section.entry(section.to_string()).or_insert(0) += 1;
        self.latencies.push(latency.as_micros() as u64);
    }

    pub fn total_requests(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Ratio of rejected to total.
    pub fn block_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        (total - self.count(Outcome::Allowed)) as f64 / total as f64
    }

    pub fn median_latency_us(&self) -> u64 {
        if self.latencies.is_empty() {
            return 0;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        sorted[sorted.len() / 2]
    }

    /// Generate a summary report.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            total_requests: self.total_requests(),
            allowed: self.count(Outcome::Allowed),
            rate_limited_global: self.count(Outcome::RateLimitedGlobal),
            rate_limited_section: self.count(Outcome::RateLimitedSection),
            invalid_params: self.count(Outcome::InvalidParams),
            block_rate: self.block_rate(),
            median_latency_us: self.median_latency_us(),
            unique_ips: self.requests_per_ip.len(),
            unique_sections: self.requests_per_section.len(),
        }
    }
}

/// Summary report of a simulation.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub total_requests: usize,
    pub allowed: usize,
    pub rate_limited_global: usize,
    pub rate_limited_section: usize,
    pub invalid_params: usize,
    pub block_rate: f64,
    pub median_latency_us: u64,
    pub unique_ips: usize,
    pub unique_sections: usize,
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Abuse Simulation Report ===")?;
        writeln!(f, "Total Requests:       {}", self.total_requests)?;
        writeln!(f)?;
        writeln!(f, "--- Outcomes ---")?;
        writeln!(f, "Allowed:              {}", self.allowed)?;
        writeln!(f, "Rate Limited (Global):{}", self.rate_limited_global)?;
        writeln!(f, "Rate Limited (Sect.): {}", self.rate_limited_section)?;
        writeln!(f, "Invalid Params:       {}", self.invalid_params)?;
        writeln!(f, "Block Rate:           {:.1}%", self.block_rate * 100.0)?;
        writeln!(f, "Median Latency:       {} us", self.median_latency_us)?;
        writeln!(f)?;
        writeln!(f, "--- Distribution ---")?;
        writeln!(f, "Unique IPs:           {}", self.unique_ips)?;
        writeln!(f, "Unique Sections:      {}", self.unique_sections)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        let mut metrics = AttackMetrics::new();
        metrics.record(Outcome::Allowed, "10.0.0.1", "15278", Duration::from_micros(100));
        metrics.record(Outcome::Allowed, "10.0.0.1", "15279", Duration::from_micros(150));
        metrics.record(Outcome::RateLimitedSection, "10.0.0.1", "15278", Duration::from_micros(50));

        let report = metrics.report();
        assert_eq!(report.total_requests, 3);
        assert_eq!(report.allowed, 2);
        assert_eq!(report.rate_limited_section, 1);
        assert_eq!(report.unique_ips, 1);
        assert_eq!(report.unique_sections, 2);
    }

    #[test]
    fn test_block_rate() {
        let mut metrics = AttackMetrics::new();
        for _ in 0..3 {
            metrics.record(Outcome::Allowed, "10.0.0.1", "1", Duration::ZERO);
        }
        for _ in 0..7 {
            metrics.record(Outcome::RateLimitedGlobal, "10.0.0.1", "1", Duration::ZERO);
        }

        assert!((metrics.block_rate() - 0.7).abs() < 0.01);
    }
}
