// Copyright 2019 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! Tool utilities
pub mod cli;
pub mod config;
mod global_config;

pub use global_config::GlobalConfig;
