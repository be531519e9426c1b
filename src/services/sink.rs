use std::path::Path;

use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc::UnboundedReceiver,
};

use crate::{
    configuration::{OutputFormat, OutputSettings},
    domain::movie::MovieRecord,
};

/// Writes scraped records to a file, either one JSON object per line or a
/// single JSON array.
pub struct RecordSink {
    writer: BufWriter<File>,
    format: OutputFormat,
    written: usize,
}

impl RecordSink {
    pub async fn create(settings: &OutputSettings) -> std::io::Result<Self> {
        Self::open(&settings.path, settings.format).await
    }

    pub async fn open(path: impl AsRef<Path>, format: OutputFormat) -> std::io::Result<Self> {
        let file = File::create(path).await?;
        let mut writer = BufWriter::new(file);

        if format == OutputFormat::Json {
            writer.write_all(b"[").await?;
        }

        Ok(RecordSink {
            writer,
            format,
            written: 0,
        })
    }

    pub async fn write(&mut self, record: &MovieRecord) -> std::io::Result<()> {
        let line = serde_json::to_string(record)?;

        match self.format {
            OutputFormat::Jsonl => {
                self.writer.write_all(line.as_bytes()).await?;
                self.writer.write_all(b"\n").await?;
            }
            OutputFormat::Json => {
                let sep: &[u8] = if self.written == 0 { b"\n" } else { b",\n" };
                self.writer.write_all(sep).await?;
                self.writer.write_all(line.as_bytes()).await?;
            }
        }

        self.written += 1;
        Ok(())
    }

    /// Closes the array if needed and flushes. Returns the record count.
    pub async fn finish(mut self) -> std::io::Result<usize> {
        if self.format == OutputFormat::Json {
            self.writer.write_all(b"\n]\n").await?;
        }
        self.writer.flush().await?;

        Ok(self.written)
    }
}

pub async fn record_sink_handler(
    mut record_receiver: UnboundedReceiver<MovieRecord>,
    mut sink: RecordSink,
) -> std::io::Result<usize> {
    log::info!("Started record sink");

    while let Some(record) = record_receiver.recv().await {
        if let Err(e) = sink.write(&record).await {
            log::error!("Error writing record from {}: {:?}", record.source_url, e);
            return Err(e);
        }
    }

    sink.finish().await
}
