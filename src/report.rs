//! Append-only report sink shared by all stages.
//!
//! A single owning task serializes every append, so a record's lines are
//! never interleaved with another stage's record regardless of how stages
//! are scheduled. Handles are cheap clones of the queue's sending end.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{PipelineErr, Result};

/// One stage invocation's report output: a header line plus body lines,
/// appended to the sink as one atomic unit.
#[derive(Debug, Clone)]
pub struct ReportRecord {
    header: String,
    lines: Vec<String>,
}

impl ReportRecord {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            lines: Vec::new(),
        }
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn render(&self) -> String {
        let mut out = String::with_capacity(self.header.len() + 16 * self.lines.len());
        out.push_str(&self.header);
        out.push('\n');
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// Cloneable appender handed to each stage.
#[derive(Clone)]
pub struct ReportHandle {
    tx: mpsc::UnboundedSender<ReportRecord>,
}

impl ReportHandle {
    /// Queues `record` for the writer task.
    ///
    /// # Errors
    /// `ReportSinkUnavailable` if the writer task is gone.
    pub fn append(&self, record: ReportRecord) -> Result<()> {
        self.tx
            .send(record)
            .map_err(|_| PipelineErr::ReportSinkUnavailable)
    }
}

pub struct ReportSink;

impl ReportSink {
    /// Spawns the owning writer task over `writer`.
    ///
    /// # Returns
    /// The appender handle and the writer task's join handle. Once every
    /// handle clone is dropped the task flushes and yields the writer back.
    pub fn spawn<W>(mut writer: W) -> (ReportHandle, JoinHandle<io::Result<W>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<ReportRecord>();

        let task = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                writer.write_all(record.render().as_bytes()).await?;
            }
            writer.flush().await?;
            Ok(writer)
        });

        (ReportHandle { tx }, task)
    }
}
