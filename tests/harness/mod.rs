// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for the MCP server.
//!
//! Provides a scripted upstream, a failing store, request builders and
//! abuse simulations against the rate limiter.

#![allow(dead_code)]

pub mod attacks;
pub mod fixtures;
pub mod generators;
pub mod metrics;
