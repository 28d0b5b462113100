use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use couchstream_engine::config::parser;
use couchstream_engine::{BatchSink, CouchClient, FlushOutcome};
use couchstream_types::{SinkRecord, TopicPartition};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Execute the `sink` command: read JSON-line records from stdin and write
/// them to the store in bulk until EOF or interrupt.
pub async fn execute(config_path: &Path, flush_interval_ms: Option<u64>) -> Result<()> {
    let config = parser::parse_config(config_path)
        .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;
    let sink_config = config.sink.context("Config has no `sink` section")?;
    let chunk_size = sink_config.batch_size;

    let client = CouchClient::new(&sink_config.connection)?;
    let sink = BatchSink::start(sink_config, client)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending: Vec<SinkRecord> = Vec::with_capacity(chunk_size);
    let mut offsets: HashMap<TopicPartition, i64> = HashMap::new();
    let mut invalid_lines = 0u64;
    let mut ticker = flush_interval_ms
        .filter(|ms| *ms > 0)
        .map(|ms| tokio::time::interval(Duration::from_millis(ms)));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line) {
                    Ok(record) => pending.push(record),
                    Err(e) => {
                        invalid_lines += 1;
                        tracing::warn!(error = %e, "Skipping unparsable input line");
                        continue;
                    }
                }
                if pending.len() >= chunk_size {
                    put_pending(&sink, &mut pending, &mut offsets).await;
                }
            }
            () = tick(ticker.as_mut()) => {
                put_pending(&sink, &mut pending, &mut offsets).await;
                sink.flush(&offsets).await;
            }
            _ = &mut ctrl_c => {
                tracing::info!("Interrupt received, flushing and stopping sink");
                break;
            }
        }
    }

    put_pending(&sink, &mut pending, &mut offsets).await;
    let outcome = sink.stop().await;
    let stats = sink.stats().await;
    tracing::info!(
        committed = stats.documents_committed,
        dropped = stats.documents_dropped,
        skipped = stats.records_skipped,
        invalid_lines,
        "Sink stopped"
    );
    if matches!(outcome, FlushOutcome::Dropped(_)) {
        anyhow::bail!("Final bulk write failed");
    }
    Ok(())
}

async fn tick(ticker: Option<&mut tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn put_pending<W: couchstream_engine::BulkWrite>(
    sink: &BatchSink<W>,
    pending: &mut Vec<SinkRecord>,
    offsets: &mut HashMap<TopicPartition, i64>,
) {
    if pending.is_empty() {
        return;
    }
    for record in pending.iter() {
        let entry = offsets.entry(record.location()).or_insert(record.offset);
        *entry = (*entry).max(record.offset);
    }
    sink.put(pending).await;
    pending.clear();
}

/// Decode one input line into a sink record.
fn parse_line(line: &str) -> Result<SinkRecord> {
    serde_json::from_str(line).context("Invalid sink record")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_accepts_object_and_text_values() {
        let record = parse_line(
            r#"{"topic":"animals","partition":0,"offset":12,"value":{"_id":"zebra"}}"#,
        )
        .unwrap();
        assert_eq!(record.location(), TopicPartition::new("animals", 0));
        assert_eq!(record.offset, 12);
        assert!(record.value_schema.is_none());
        assert_eq!(record.document().unwrap()["_id"], "zebra");

        let record = parse_line(
            r#"{"topic":"animals","partition":1,"offset":3,"value_schema":{"type":"string"},"value":"{\"_id\":\"lion\"}"}"#,
        )
        .unwrap();
        assert_eq!(record.document().unwrap()["_id"], "lion");
    }

    #[test]
    fn test_parse_line_rejects_missing_fields() {
        assert!(parse_line(r#"{"topic":"animals","value":{}}"#).is_err());
        assert!(parse_line("not json").is_err());
    }
}
