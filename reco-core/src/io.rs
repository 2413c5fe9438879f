//! Event input/output (`SPEC_FULL.md` §6 "Input event interface", §4.6 "Output interface").
//!
//! The parton-shower generator and the on-disk output format are external collaborators
//! (`SPEC_FULL.md` §1); this module defines the narrow traits the pipeline drives them through
//! (`EventSource`, `EventSink`) plus the in-tree implementations used by the CLI and by tests:
//! an in-memory source, and a `bincode`-backed file source/sink mirroring the length-prefixed
//! record idiom `grid.rs` uses for persisting a single large structure.

use crate::candidate::Candidate;
use crate::error::{Error, Result};
use crate::event::EventRecord;
use crate::module::{InitContext, Module, ModuleContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom, Write};

/// Supplies generator-level events to the pipeline, one at a time. Stands in for the external
/// Les Houches / HepMC reader (`SPEC_FULL.md` §1).
pub trait EventSource {
    /// Returns the next event, or `None` once the source is exhausted.
    fn next_event(&mut self) -> Result<Option<EventRecord>>;
}

/// An `EventSource` over events already held in memory, used by tests and small scripted runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventSource {
    events: Vec<EventRecord>,
    cursor: usize,
}

impl InMemoryEventSource {
    /// Creates a source that yields `events` in order, then `None`.
    #[must_use]
    pub const fn new(events: Vec<EventRecord>) -> Self {
        Self { events, cursor: 0 }
    }
}

impl EventSource for InMemoryEventSource {
    fn next_event(&mut self) -> Result<Option<EventRecord>> {
        if self.cursor >= self.events.len() {
            return Ok(None);
        }
        let event = self.events[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(event))
    }
}

/// One event's worth of output: a snapshot of every configured branch's candidates, resolved out
/// of the per-event factory pool since candidate ids are meaningless across an event boundary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    /// Branch name (the exported array's name) to the candidates it held this event.
    pub branches: BTreeMap<String, Vec<Candidate>>,
}

/// Accepts one `OutputEvent` per call, in order, and a `close` at run end. Stands in for the
/// external columnar-tree output format (`SPEC_FULL.md` §4.6).
pub trait EventSink {
    /// Appends one event's branches.
    fn fill(&mut self, event: &OutputEvent) -> Result<()>;
    /// Flushes and finalises the sink. Called once, at `Finish`.
    fn close(&mut self) -> Result<()>;
}

/// An `EventSink` that keeps every filled event in memory, used by tests.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    /// Every event filled so far, in order.
    pub events: Vec<OutputEvent>,
}

impl EventSink for InMemoryEventSink {
    fn fill(&mut self, event: &OutputEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

fn io_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::External(format!("{context}: {e}"))
}

/// A `bincode`-backed `EventSource` reading length-prefixed `EventRecord`s: an 8-byte
/// little-endian length followed by that many serialized bytes, repeated until EOF.
pub struct BincodeEventSource<R> {
    reader: R,
}

impl<R: Read + Seek> BincodeEventSource<R> {
    /// Wraps `reader`, positioned at the start of the record stream.
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read + Seek> EventSource for BincodeEventSource<R> {
    fn next_event(&mut self) -> Result<Option<EventRecord>> {
        let mut len_bytes = [0u8; 8];
        match self.reader.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(io_err("reading record length", e)),
        }
        let len = u64::from_le_bytes(len_bytes);
        let mut buf = vec![0u8; usize::try_from(len).map_err(|e| io_err("record length", e))?];
        self.reader.read_exact(&mut buf).map_err(|e| io_err("reading record body", e))?;
        let record = bincode::deserialize(&buf).map_err(|e| io_err("decoding event record", e))?;
        Ok(Some(record))
    }
}

/// A `bincode`-backed `EventSink` writing the same length-prefixed record format as
/// [`BincodeEventSource`]. Reserves an 8-byte event count at the start of the stream, patched in
/// at `close` via `Seek`.
pub struct BincodeEventSink<W> {
    writer: W,
    count: u64,
}

impl<W: Write + Seek> BincodeEventSink<W> {
    /// Creates a sink over `writer`, writing a placeholder event count at the current position.
    pub fn new(mut writer: W) -> Result<Self> {
        writer.write_all(&0u64.to_le_bytes()).map_err(|e| io_err("writing count placeholder", e))?;
        Ok(Self { writer, count: 0 })
    }
}

impl<W: Write + Seek> EventSink for BincodeEventSink<W> {
    fn fill(&mut self, event: &OutputEvent) -> Result<()> {
        let bytes = bincode::serialize(event).map_err(|e| io_err("encoding output event", e))?;
        let len = u64::try_from(bytes.len()).map_err(|e| io_err("record length", e))?;
        self.writer.write_all(&len.to_le_bytes()).map_err(|e| io_err("writing record length", e))?;
        self.writer.write_all(&bytes).map_err(|e| io_err("writing record body", e))?;
        self.count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.seek(SeekFrom::Start(0)).map_err(|e| io_err("seeking to count header", e))?;
        self.writer.write_all(&self.count.to_le_bytes()).map_err(|e| io_err("patching event count", e))?;
        self.writer.flush().map_err(|e| io_err("flushing sink", e))
    }
}

/// `TreeWriter` module (`SPEC_FULL.md` §4.6, component C10): imports the configured list of
/// exported arrays and, once per event, resolves each into owned `Candidate`s and hands the
/// result to an [`EventSink`].
pub struct TreeWriter {
    branch_arrays: Vec<String>,
    sink: Box<dyn EventSink + Send + Sync>,
}

impl TreeWriter {
    /// Creates a writer over the given branch array names, draining into `sink`.
    #[must_use]
    pub fn new(branch_arrays: Vec<String>, sink: Box<dyn EventSink + Send + Sync>) -> Self {
        Self { branch_arrays, sink }
    }
}

impl Module for TreeWriter {
    fn name(&self) -> &str {
        "TreeWriter"
    }

    fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        for name in self.branch_arrays.clone() {
            ctx.import_array(&name)?;
        }
        Ok(())
    }

    fn process(&mut self, ctx: &mut ModuleContext) -> Result<()> {
        let mut event = OutputEvent::default();
        for name in &self.branch_arrays {
            let candidates = ctx.import_array(name).iter().map(|&id| ctx.factory.get(id).clone()).collect();
            event.branches.insert(name.clone(), candidates);
        }
        self.sink.fill(&event)
    }

    fn finish(&mut self) -> Result<()> {
        self.sink.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::ArrayRegistry;
    use crate::candidate::FourVector;
    use crate::config::Config;
    use crate::factory::Factory;
    use std::io::Cursor;

    #[test]
    fn in_memory_source_yields_events_then_none() {
        let mut source = InMemoryEventSource::new(vec![EventRecord {
            number: 1,
            ..EventRecord::default()
        }]);
        assert_eq!(source.next_event().unwrap().unwrap().number, 1);
        assert!(source.next_event().unwrap().is_none());
    }

    #[test]
    fn bincode_round_trip_preserves_event_count_and_fields() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut sink = BincodeEventSink::new(&mut buf).unwrap();
            sink.fill(&OutputEvent {
                branches: BTreeMap::from([(
                    "jets".to_owned(),
                    vec![Candidate {
                        momentum: FourVector::new(100.0, 80.0, 60.0, 0.0),
                        ..Candidate::default()
                    }],
                )]),
            })
            .unwrap();
            sink.close().unwrap();
        }

        buf.set_position(0);
        let mut len_bytes = [0u8; 8];
        buf.read_exact(&mut len_bytes).unwrap();
        assert_eq!(u64::from_le_bytes(len_bytes), 1);
    }

    #[test]
    fn in_memory_sink_accumulates_events() {
        let mut sink = InMemoryEventSink::default();
        sink.fill(&OutputEvent::default()).unwrap();
        sink.fill(&OutputEvent::default()).unwrap();
        sink.close().unwrap();
        assert_eq!(sink.events.len(), 2);
    }

    #[derive(Clone, Default)]
    struct SharedSink(std::sync::Arc<std::sync::Mutex<Vec<OutputEvent>>>);

    impl EventSink for SharedSink {
        fn fill(&mut self, event: &OutputEvent) -> Result<()> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn tree_writer_resolves_candidates_into_owned_output() {
        let mut factory = Factory::new();
        let mut arrays = ArrayRegistry::new();
        let id = factory.new_candidate();
        *factory.get_mut(id) = Candidate {
            momentum: FourVector::new(5.0, 3.0, 4.0, 0.0),
            ..Candidate::default()
        };
        arrays.declare_export("Reader", "photons").unwrap();
        arrays.export("photons", vec![id]);

        let config = Config::empty();
        let sink = SharedSink::default();
        let mut writer = TreeWriter::new(vec!["photons".to_owned()], Box::new(sink.clone()));
        {
            let mut init_ctx = InitContext::new("TreeWriter".to_owned(), &mut arrays, config.module("TreeWriter"));
            writer.init(&mut init_ctx).unwrap();
        }
        let mut rng = crate::rng::RandomService::new(1);
        let pdg = crate::pdg::PdgTable::standard();
        {
            let mut ctx = ModuleContext::new(&mut factory, &mut arrays, &mut rng, &pdg, config.module("TreeWriter"));
            writer.process(&mut ctx).unwrap();
        }
        writer.finish().unwrap();

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        let photons = &events[0].branches["photons"];
        assert_eq!(photons.len(), 1);
        assert!((photons[0].momentum.px - 3.0).abs() < 1e-9);
    }
}
