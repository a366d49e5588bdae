// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! `creation-importer health`: probe the destination service.

use crate::cli::output;
use anyhow::{Context, Result};

pub async fn run(endpoint: Option<&str>, json: bool) -> Result<()> {
    let config = super::load_config(endpoint)?;
    let client = super::destination(&config);
    let health = client
        .health()
        .await
        .with_context(|| format!("destination {} is not reachable", config.endpoint))?;

    if json {
        output::print_json_line(&health);
    } else {
        let service = health.service.as_deref().unwrap_or("destination");
        println!("{service} at {}: {}", config.endpoint, health.status);
    }
    Ok(())
}
