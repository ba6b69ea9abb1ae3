//! Line-delimited JSON transport over stdin/stdout.
//!
//! Each input line is one `DisplayMessage`; each output line is one
//! `HostMessage`. Lines that are not valid messages are logged and skipped.

use crate::engine::Engine;
use crate::protocol::{DisplayMessage, HostMessage};
use crate::services::host_session::HostSession;
use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 64;

/// Serve `session` on the process's stdin and stdout until stdin closes
pub async fn serve<E: Engine + 'static>(session: HostSession<E>) -> Result<()> {
    info!(target: "transport", "Serving line-delimited JSON on stdio");
    serve_io(
        session,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Serve `session` over any line reader and writer
pub async fn serve_io<E, R, W>(session: HostSession<E>, reader: R, mut writer: W) -> Result<()>
where
    E: Engine + 'static,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (display_tx, display_rx) = mpsc::channel::<DisplayMessage>(CHANNEL_CAPACITY);
    let (host_tx, mut host_rx) = mpsc::channel::<HostMessage>(CHANNEL_CAPACITY);
    let session_task = tokio::spawn(session.run(display_rx, host_tx));

    let mut lines = reader.lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from input")? else {
                    debug!(target: "transport", "Input closed");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<DisplayMessage>(line) {
                    Ok(message) => {
                        if display_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(target: "transport", "Skipping malformed message: {}", e),
                }
            }
            Some(message) = host_rx.recv() => write_message(&mut writer, &message).await?,
        }
    }

    // Let the session answer whatever is still in flight
    drop(display_tx);
    while let Some(message) = host_rx.recv().await {
        write_message(&mut writer, &message).await?;
    }

    session_task.await.context("Host session panicked")?
}

async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &HostMessage) -> Result<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .context("Failed to write to output")?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataColumn, DataRow, DataTable, DataType, DataValue};
    use crate::engine::MemoryEngine;
    use serde_json::Value;
    use std::sync::Arc;

    fn session() -> HostSession<MemoryEngine> {
        let mut table = DataTable::new("data");
        table.add_column(DataColumn::new("n").with_type(DataType::Integer));
        for i in 0..5 {
            table.add_row(DataRow::new(vec![DataValue::Integer(i)])).unwrap();
        }
        let mut engine = MemoryEngine::new();
        engine.register_table("data", table);
        HostSession::new(Arc::new(engine), 100)
    }

    #[tokio::test]
    async fn test_answers_query_then_stops_at_eof() {
        let input = b"not json\n{\"type\":\"query\",\"sql\":\"SELECT * FROM data\",\"limit\":3}\n";
        let mut output = Vec::new();

        serve_io(session(), &input[..], &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);

        let reply: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(reply["type"], "query");
        assert_eq!(reply["success"], true);
        assert_eq!(reply["results"].as_array().unwrap().len(), 3);
        assert_eq!(reply["describe"][0]["type"], "BIGINT");
    }
}
