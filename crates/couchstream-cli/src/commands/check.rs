use std::path::Path;

use anyhow::{Context, Result};
use couchstream_engine::client::ChangesRequest;
use couchstream_engine::config::{parser, validator};
use couchstream_engine::{ChangesFeed, CouchClient};
use couchstream_state::{OffsetStore, SqliteOffsetStore};
use couchstream_types::Cursor;

/// Execute the `check` command: validate config, offset store and source
/// connectivity.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = parser::parse_config(config_path)
        .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;
    if config.source.is_none() && config.sink.is_none() {
        anyhow::bail!("Config defines neither `source` nor `sink`");
    }

    let mut ok = true;

    if let Some(source) = &config.source {
        ok &= report("Source config", validator::validate_source(source));

        let store = SqliteOffsetStore::open(&config.state_path);
        match store {
            Ok(store) => {
                let offset = store.get_offset(&source.source_identity());
                ok &= report(
                    "Offset store",
                    offset.as_ref().map(|_| ()).map_err(ToString::to_string),
                );
                if let Ok(Some(offset)) = offset {
                    println!("  committed cursor: {}", offset.last_change_seq);
                }
            }
            Err(e) => ok &= report("Offset store", Err::<(), _>(e)),
        }

        let reachable = match CouchClient::new(&source.connection) {
            Ok(client) => client
                .fetch_changes(&ChangesRequest::catch_up(Cursor::beginning(), 1))
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };
        ok &= report("Source database", reachable);
    }

    if let Some(sink) = &config.sink {
        ok &= report("Sink config", validator::validate_sink(sink));
    }

    if ok {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}

fn report<E: std::fmt::Display>(label: &str, result: Result<(), E>) -> bool {
    println!(
        "{:18} {}",
        format!("{label}:"),
        if result.is_ok() { "OK" } else { "FAILED" }
    );
    match result {
        Ok(()) => true,
        Err(e) => {
            println!("  {e}");
            false
        }
    }
}
