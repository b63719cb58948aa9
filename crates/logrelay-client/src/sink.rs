//! Destinations for decoded records.

use std::io::{self, Write};

use chrono::{Local, TimeZone};
use logrelay_core::DecodedRecord;
use tokio::sync::mpsc;
use tracing::warn;

/// Receives every record the subscriber decodes.
pub trait RecordSink: Send {
    /// Handle one record.
    fn emit(&mut self, record: &DecodedRecord);
}

/// Forward records to a channel, e.g. for an embedding UI.
impl RecordSink for mpsc::UnboundedSender<DecodedRecord> {
    fn emit(&mut self, record: &DecodedRecord) {
        let _ = self.send(record.clone());
    }
}

/// Plain-text renderer: `MM-DD HH:MM:SS.mmm | LEVEL    | file:function:line - message`.
pub struct ConsoleSink<W: Write + Send = io::Stdout> {
    out: W,
}

impl ConsoleSink<io::Stdout> {
    /// Write to standard output.
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Write to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RecordSink for ConsoleSink<W> {
    fn emit(&mut self, record: &DecodedRecord) {
        let line = format_record(record, &Local);
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!(error = %e, "failed to write record");
        }
    }
}

/// Render a record in console form, with the timestamp shown in `tz`.
pub fn format_record<Tz: TimeZone>(record: &DecodedRecord, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let time = record.datetime().map_or_else(
        || format!("{:.3}", record.timestamp),
        |dt| dt.with_timezone(tz).format("%m-%d %H:%M:%S%.3f").to_string(),
    );
    format!(
        "{time} | {:<8} | {}:{}:{} - {}",
        record.level, record.file, record.function, record.line_no, record.message
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use logrelay_core::LogLevel;

    use super::*;

    fn decoded() -> DecodedRecord {
        DecodedRecord {
            timestamp: 1_700_000_000.25,
            level: LogLevel::Warning,
            file: "cart.rs".into(),
            function: "checkout".into(),
            line_no: "88".into(),
            message: "stock low".into(),
        }
    }

    #[test]
    fn formats_in_given_timezone() {
        assert_eq!(
            format_record(&decoded(), &Utc),
            "11-14 22:13:20.250 | WARNING  | cart.rs:checkout:88 - stock low"
        );
    }

    #[test]
    fn console_sink_writes_one_line_per_record() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.emit(&decoded());
        sink.emit(&decoded());
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.ends_with("| WARNING  | cart.rs:checkout:88 - stock low")));
    }

    #[test]
    fn channel_sink_forwards_records() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        tx.emit(&decoded());
        assert_eq!(rx.try_recv().unwrap(), decoded());
    }
}
