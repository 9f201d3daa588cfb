// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Abuse patterns for security testing.
//!
//! Time is simulated: each request advances a manual clock by
//! `interval_ms`, so patterns spanning several windows run instantly.

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of `tools/call` requests to send
    pub total_requests: usize,
    /// Simulated milliseconds between requests
    pub interval_ms: i64,
    /// Number of unique client addresses
    pub unique_ips: usize,
    /// Number of unique sections requested
    pub unique_sections: usize,
    /// Whether section arguments are well-formed
    pub valid_sections: bool,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            interval_ms: 100,
            unique_ips: 1,
            unique_sections: 1,
            valid_sections: true,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// One client hammering one section.
    pub fn section_hammer() -> Self {
        Self {
            total_requests: 200,
            interval_ms: 10,
            unique_ips: 1,
            unique_sections: 1,
            ..Default::default()
        }
    }

    /// One client sweeping many sections to get around the section limit.
    pub fn section_sweep() -> Self {
        Self {
            total_requests: 300,
            interval_ms: 10,
            unique_ips: 1,
            unique_sections: 100,
            ..Default::default()
        }
    }

    /// Many clients, each sending little.
    pub fn distributed() -> Self {
        Self {
            total_requests: 500,
            interval_ms: 10,
            unique_ips: 100,
            unique_sections: 50,
            ..Default::default()
        }
    }

    /// Garbage section arguments.
    pub fn malformed_flood() -> Self {
        Self {
            total_requests: 100,
            interval_ms: 10,
            unique_ips: 5,
            unique_sections: 10,
            valid_sections: false,
        }
    }

    /// A well-behaved client staying under both limits.
    pub fn slow_drip() -> Self {
        Self {
            total_requests: 60,
            // One request every 7 s: at most 9 per 60 s window
            interval_ms: 7_000,
            unique_ips: 1,
            unique_sections: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_nonempty() {
        for config in [
            AttackConfig::section_hammer(),
            AttackConfig::section_sweep(),
            AttackConfig::distributed(),
            AttackConfig::malformed_flood(),
            AttackConfig::slow_drip(),
        ] {
            assert!(config.total_requests > 0);
            assert!(config.unique_ips > 0);
            assert!(config.unique_sections > 0);
        }
    }
}
