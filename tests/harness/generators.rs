// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test data generators for abuse simulation.

use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of client addresses.
pub fn generate_ips(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c)).to_string()
        })
        .collect()
}

/// Generate a pool of well-formed section numbers, some with decimals.
pub fn generate_sections(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            if i % 3 == 2 {
                format!("{}.{}", 44000 + i, i % 9 + 1)
            } else {
                (15000 + i).to_string()
            }
        })
        .collect()
}

/// Section arguments the validator must reject before any storage access.
pub fn generate_malformed_sections() -> Vec<&'static str> {
    vec![
        "abc",
        "15278.",
        ".5",
        "1.2.3",
        "15278a",
        "-1",
        "1 2",
        "15278; DROP TABLE",
        "../../etc/passwd",
        "15278&lawCode=PEN",
        "<script>",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ips() {
        let ips = generate_ips(256);
        assert_eq!(ips.len(), 256);
        // All should be unique
        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), 256);
    }

    #[test]
    fn test_generate_sections_are_unique() {
        let sections = generate_sections(30);
        let unique: std::collections::HashSet<_> = sections.iter().collect();
        assert_eq!(unique.len(), 30);
        assert!(sections.iter().any(|s| s.contains('.')));
    }
}
