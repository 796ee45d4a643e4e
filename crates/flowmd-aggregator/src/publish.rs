//! Report serialization and delivery seams.
//!
//! The aggregator hands a finished [`Report`] to a [`ReportSerializer`]
//! and the resulting bytes to a [`ReportTransport`]. Production wiring
//! (protobuf encoding, an MQTT client) lives outside this crate; JSON and
//! an `io::Write` transport are provided here.

use parking_lot::Mutex;
use std::io::Write;

use crate::window::Report;

/// Error returned by serializers and transports.
pub type PublishError = Box<dyn std::error::Error + Send + Sync>;

/// Turns a report into bytes.
pub trait ReportSerializer: Send + Sync {
    fn serialize(&self, report: &Report) -> Result<Vec<u8>, PublishError>;
}

/// Delivers serialized reports to a collector.
pub trait ReportTransport: Send + Sync {
    fn send(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

/// Encodes reports as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportSerializer {
    pretty: bool,
}

impl JsonReportSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl ReportSerializer for JsonReportSerializer {
    fn serialize(&self, report: &Report) -> Result<Vec<u8>, PublishError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(report)?
        } else {
            serde_json::to_vec(report)?
        };
        Ok(bytes)
    }
}

/// Writes `topic<TAB>payload<NL>` records to any writer.
pub struct WriterTransport<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> ReportTransport for WriterTransport<W> {
    fn send(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let mut writer = self.writer.lock();
        writer.write_all(topic.as_bytes())?;
        writer.write_all(b"\t")?;
        writer.write_all(payload)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl<W> std::fmt::Debug for WriterTransport<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterTransport").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeInfo;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_serializer_empty_report() {
        let report = Report::new(NodeInfo::new("node-7", "lab"), 1);
        let bytes = JsonReportSerializer::new().serialize(&report).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"node_info":{"node_id":"node-7","location_id":"lab"},"windows":[]}"#
        );
    }

    #[test]
    fn test_writer_transport_framing() {
        let transport = WriterTransport::new(Vec::new());
        transport.send("flows/node-7", b"{}").unwrap();
        transport.send("flows/node-7", b"[]").unwrap();
        assert_eq!(
            String::from_utf8(transport.into_inner()).unwrap(),
            "flows/node-7\t{}\nflows/node-7\t[]\n"
        );
    }
}
