// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment readiness check.

use crate::config::config_file_path;
use crate::renderer::chromium::find_chromium;
use anyhow::Result;

/// Check Chromium availability, configuration, and the destination service.
pub async fn run(endpoint: Option<&str>) -> Result<()> {
    println!("Creation Importer Doctor");
    println!("========================");
    println!();

    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let chromium_path = find_chromium();
    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome or set CREATION_IMPORTER_CHROMIUM_PATH."
        ),
    }

    match config_file_path() {
        Some(path) if path.exists() => println!("[OK] Config file: {}", path.display()),
        Some(path) => println!("[--] No config file at {} (using defaults)", path.display()),
        None => println!("[??] Could not determine home directory"),
    }

    let config = match super::load_config(endpoint) {
        Ok(config) => Some(config),
        Err(e) => {
            println!("[!!] Config invalid: {e:#}");
            None
        }
    };

    let mut destination_ok = false;
    if let Some(config) = &config {
        let client = super::destination(config);
        match client.health().await {
            Ok(health) => {
                destination_ok = true;
                println!(
                    "[OK] Destination {} reports \"{}\"",
                    config.endpoint, health.status
                );
            }
            Err(e) => println!("[!!] Destination {} unreachable: {e}", config.endpoint),
        }
    }

    println!();
    if chromium_path.is_some() && config.is_some() && destination_ok {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
