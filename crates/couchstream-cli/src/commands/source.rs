use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use couchstream_engine::config::parser;
use couchstream_engine::{ChangeFeedPoller, CouchClient};
use couchstream_state::SqliteOffsetStore;
use couchstream_types::EmittedRecord;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::checkpoint::Checkpoint;

/// Execute the `source` command: follow the changes feed until interrupted,
/// printing one JSON record per line and committing the cursor after each batch.
pub async fn execute(config_path: &Path, max_records: Option<u64>) -> Result<()> {
    let config = parser::parse_config(config_path)
        .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;
    let source = config
        .source
        .context("Config has no `source` section")?;
    let store = SqliteOffsetStore::open(&config.state_path).with_context(|| {
        format!(
            "Failed to open offset store: {}",
            config.state_path.display()
        )
    })?;

    let client = Arc::new(CouchClient::new(&source.connection)?);
    let mut poller = ChangeFeedPoller::start(source, client, Some(&store))?;

    let handle = poller.stop_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping change feed");
            handle.stop().await;
        }
    });

    let mut stdout = tokio::io::stdout();
    let mut checkpoint = Checkpoint::new(&store, poller.cursor().clone());
    let mut emitted = 0u64;
    while let Some(records) = poller.poll().await? {
        if !records.is_empty() {
            write_batch(&mut stdout, &records).await?;
        }
        checkpoint.advance(poller.source(), poller.cursor())?;
        emitted += records.len() as u64;

        if max_records.is_some_and(|max| emitted >= max) {
            tracing::info!(records = emitted, "Record limit reached");
            poller.stop_handle().stop().await;
        }
    }
    interrupt.abort();

    tracing::info!(
        url = %poller.source(),
        records = emitted,
        cursor = %poller.cursor(),
        "Change feed stopped"
    );
    Ok(())
}

/// Write `records` as JSON lines and flush.
async fn write_batch<W>(out: &mut W, records: &[EmittedRecord]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buf, record).context("Failed to encode record")?;
        buf.push(b'\n');
    }
    out.write_all(&buf).await.context("Failed to write records")?;
    out.flush().await.context("Failed to flush records")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use couchstream_types::schema::{SchemaValue, ValueSchema};
    use couchstream_types::{Cursor, SourceIdentity};

    #[tokio::test]
    async fn test_write_batch_emits_one_line_per_record() {
        let records: Vec<EmittedRecord> = ["a", "b"]
            .iter()
            .map(|key| EmittedRecord {
                source: SourceIdentity::new("http://localhost:5984/animals"),
                position: Cursor::new("2-b"),
                topic: "animals".into(),
                key: (*key).to_string(),
                value: SchemaValue {
                    schema: ValueSchema::String,
                    value: serde_json::json!(format!(r#"{{"_id":"{key}"}}"#)),
                },
            })
            .collect();

        let mut out = Vec::new();
        write_batch(&mut out, &records).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: EmittedRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, records[0]);
        assert!(lines[1].contains(r#""position":"2-b""#));
    }
}
