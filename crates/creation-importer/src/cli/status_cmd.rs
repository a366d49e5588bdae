// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! `creation-importer status`: look up a creation at the destination.

use crate::cli::output;
use anyhow::Result;

pub async fn run(endpoint: Option<&str>, creation_id: &str, json: bool) -> Result<()> {
    let config = super::load_config(endpoint)?;
    let client = super::destination(&config);
    let status = client.check_status(creation_id).await?;

    if json {
        output::print_json_line(&status);
        return Ok(());
    }

    if status.exists {
        println!("{creation_id}: imported");
        if let Some(title) = &status.title {
            println!("  Title:    {title}");
        }
        if let Some(id) = &status.id {
            println!("  Id:       {id}");
        }
        if let Some(kind) = &status.creation_type {
            println!("  Type:     {kind}");
        }
        if let Some(at) = &status.imported_at {
            println!("  Imported: {at}");
        }
    } else {
        println!("{creation_id}: not imported");
    }
    Ok(())
}
