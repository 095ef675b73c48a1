//! JSON Lines Batch Source
//!
//! Reads one [`RawEventBatch`] per line from any async reader, typically a
//! replay file or stdin. Blank lines are skipped.
//!
//! ```text
//! {"height":1,"events":[{"type":"injective.oracle.v1beta1.SetProviderPriceEvent","attributes":[...]}]}
//! {"height":2,"events":[]}
//! ```

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};

use crate::application::ports::{BatchSource, SourceError};
use crate::domain::events::RawEventBatch;

/// Path that selects stdin.
pub const STDIN_PATH: &str = "-";

/// Batch source over newline-delimited JSON.
#[derive(Debug)]
pub struct JsonLinesSource<R> {
    reader: R,
    line: usize,
    buffer: String,
    interval: Option<Duration>,
    emitted: u64,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    /// Wrap a buffered reader.
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buffer: String::new(),
            interval: None,
            emitted: 0,
        }
    }

    /// Pause for `interval` before every batch after the first.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = (!interval.is_zero()).then_some(interval);
        self
    }
}

impl JsonLinesSource<BufReader<File>> {
    /// Open a replay file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl JsonLinesSource<BufReader<Stdin>> {
    /// Read from stdin.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> BatchSource for JsonLinesSource<R> {
    async fn next_batch(&mut self) -> Result<Option<RawEventBatch>, SourceError> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer).await? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let text = self.buffer.trim();
            if text.is_empty() {
                continue;
            }
            let batch = serde_json::from_str(text).map_err(|source| SourceError::Parse {
                line: self.line,
                source,
            })?;

            if let Some(interval) = self.interval {
                if self.emitted > 0 {
                    tokio::time::sleep(interval).await;
                }
            }
            self.emitted += 1;
            return Ok(Some(batch));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const LINES: &str = concat!(
        r#"{"height":1,"events":[{"type":"injective.oracle.v1beta1.SetProviderPriceEvent","attributes":[{"key":"symbol","value":"\"INJ\""},{"key":"price","value":"\"25.125\"","index":true}]}]}"#,
        "\n\n",
        r#"{"height":2}"#,
        "\n",
    );

    #[tokio::test]
    async fn reads_batches_and_skips_blank_lines() {
        let mut source = JsonLinesSource::new(LINES.as_bytes());

        let first = source.next_batch().await.unwrap().unwrap();
        assert_eq!(first.height, 1);
        assert_eq!(first.events.len(), 1);
        assert_eq!(first.events[0].attribute("price"), Some("\"25.125\""));

        let second = source.next_batch().await.unwrap().unwrap();
        assert_eq!(second.height, 2);
        assert!(second.events.is_empty());

        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn parse_errors_name_the_line() {
        let mut source = JsonLinesSource::new("{\"height\":1}\nnot json\n".as_bytes());
        source.next_batch().await.unwrap();

        let err = source.next_batch().await.unwrap_err();
        assert!(matches!(err, SourceError::Parse { line: 2, .. }));
        assert!(err.to_string().starts_with("invalid event batch on line 2"));
    }

    #[tokio::test]
    async fn opens_replay_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LINES.as_bytes()).unwrap();

        let mut source = JsonLinesSource::open(file.path()).await.unwrap();
        let mut heights = Vec::new();
        while let Some(batch) = source.next_batch().await.unwrap() {
            heights.push(batch.height);
        }
        assert_eq!(heights, [1, 2]);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonLinesSource::open(dir.path().join("missing.jsonl"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }

    #[tokio::test]
    async fn interval_paces_batches_after_the_first() {
        let mut source = JsonLinesSource::new("\n{\"height\":1}\n{\"height\":2}\n".as_bytes())
            .with_interval(Duration::from_millis(40));

        let started = tokio::time::Instant::now();
        source.next_batch().await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(40));
        source.next_batch().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
