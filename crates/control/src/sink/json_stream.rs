//! NDJSON (newline-delimited JSON) stream sink.
//!
//! Each row is serialized directly to the buffered writer, no intermediate
//! `String`.
//!
//! ```ignore
//! let mut sink = JsonStreamSink::stdout();
//! sink.write_events(system.drain_events())?;
//! sink.write_status(now, &system.status(now))?;
//! ```

use std::io::{self, BufWriter, Write};

use parkgate_core::{Event, Millis};
use serde::Serialize;

use super::StatusRow;
use crate::reporter::SystemStatus;

pub struct JsonStreamSink<W: Write> {
    writer: BufWriter<W>,
    rows_written: usize,
}

impl JsonStreamSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonStreamSink<W> {
    /// Wraps any writer (file, `Vec<u8>`, ...).
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(16 * 1024, writer),
            rows_written: 0,
        }
    }

    pub fn write_event(&mut self, event: &Event) -> io::Result<()> {
        self.write_row(event)
    }

    /// Writes every event in order; returns how many were written.
    pub fn write_events<I>(&mut self, events: I) -> io::Result<usize>
    where
        I: IntoIterator<Item = Event>,
    {
        let mut n = 0;
        for event in events {
            self.write_row(&event)?;
            n += 1;
        }
        Ok(n)
    }

    pub fn write_status(&mut self, at_ms: Millis, status: &SystemStatus) -> io::Result<()> {
        self.write_row(&StatusRow { at_ms, status })
    }

    /// Pushes buffered rows to the writer without closing the sink.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Flush and return how many rows were written.
    pub fn finish(mut self) -> io::Result<usize> {
        self.writer.flush()?;
        Ok(self.rows_written)
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn write_row<T: Serialize + ?Sized>(&mut self, row: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, row).map_err(io::Error::from)?;
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessController;
    use crate::allocator::{CapacityAllocator, SlotBank};
    use crate::barrier::Barrier;
    use parkgate_core::{Config, EventKind, VehicleClass};
    use parkgate_hal::SimPlatform;

    #[test]
    fn one_json_object_per_line() {
        let cfg = Config::default();
        let mut p = SimPlatform::manual();
        let bank = SlotBank::attach(&mut p, &cfg, 0);
        let status = SystemStatus::build(
            1000,
            &AccessController::new(&cfg.timing, 0),
            &Barrier::new(5, &cfg.barrier, &cfg.timing, 0),
            &CapacityAllocator::new(cfg.vip_fallback),
            &bank,
        );

        let mut buf = Vec::new();
        let mut sink = JsonStreamSink::new(&mut buf);
        let written = sink
            .write_events(vec![
                Event::new(50, EventKind::EntryRequested { class: VehicleClass::Regular }),
                Event::new(100, EventKind::AccessGranted { class: VehicleClass::Regular, slot: 4 }),
            ])
            .unwrap();
        assert_eq!(written, 2);
        sink.write_status(1000, &status).unwrap();
        assert_eq!(sink.finish().unwrap(), 3);

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "entry_requested");
        assert_eq!(lines[1]["slot"], 4);
        assert_eq!(lines[2]["at_ms"], 1000);
        assert_eq!(lines[2]["status"]["total_free"], 6);
    }
}
