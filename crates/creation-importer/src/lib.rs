// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Creation importer library: heuristic extraction of creation records from
//! rendered gallery pages, and a sequential bulk-import pipeline that feeds
//! them into a destination service.
//!
//! This library crate exposes the core modules for the binary and for
//! integration testing.

pub mod cli;
pub mod config;
pub mod destination;
pub mod dom;
pub mod extract;
pub mod images;
pub mod listing;
pub mod locator;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod renderer;
pub mod structured;
pub mod wait;
