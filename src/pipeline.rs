use std::io::Write;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::Serialize;
use tracing::info;

use crate::error::RewriteError;
use crate::io;
use crate::io::population::IOPerson;
use crate::io::PopulationSink;
use crate::rewriter::{PlanRewriter, RewriteOutcome};

const PERSON_TAG: &[u8] = b"person";
const PROGRESS_INTERVAL: usize = 100_000;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RewriteSummary {
    pub persons: usize,
    pub reassigned: usize,
    pub remapped: usize,
    pub excluded: usize,
    pub skipped: usize,
    pub unchanged: usize,
}

impl RewriteSummary {
    fn count(&mut self, outcome: RewriteOutcome) {
        self.persons += 1;
        match outcome {
            RewriteOutcome::Reassigned => self.reassigned += 1,
            RewriteOutcome::Remapped => self.remapped += 1,
            RewriteOutcome::Excluded => self.excluded += 1,
            RewriteOutcome::Skipped => self.skipped += 1,
            RewriteOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Streams the population from `input` to `output`, applying the rewriter to
/// one person at a time. Everything outside `<person>` subtrees (the xml
/// declaration, the doctype, the root element with its attributes block and
/// all comments) is copied through unmodified, and so is every person the
/// rewriter does not change. Source documents can hold tens of millions of
/// persons, so the document is never materialized as a whole.
pub fn rewrite_population(
    input: &Path,
    output: &Path,
    rewriter: &PlanRewriter,
) -> Result<RewriteSummary, RewriteError> {
    let result = rewrite_population_inner(input, output, rewriter);
    if result.is_err() {
        // a failed run must not leave a partial document behind
        let _ = std::fs::remove_file(output);
    }
    result
}

fn rewrite_population_inner(
    input: &Path,
    output: &Path,
    rewriter: &PlanRewriter,
) -> Result<RewriteSummary, RewriteError> {
    info!("Starting to rewrite population from {input:?} to {output:?}");

    let mut reader = Reader::from_reader(io::open_reader(input)?);
    let mut writer = Writer::new(PopulationSink::create(output)?);
    let mut summary = RewriteSummary::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) if e.name().as_ref() == PERSON_TAG => {
                let start = e.into_owned();
                let events = read_person_events(&mut reader, start)?;
                let outcome = process_person(&events, rewriter, &mut writer)?;
                summary.count(outcome);
                if summary.persons % PROGRESS_INTERVAL == 0 {
                    info!("Processed {} persons", summary.persons);
                }
            }
            event => writer.write_event(event)?,
        }
    }

    writer.into_inner().finish()?;
    info!(
        "Finished writing population to {output:?}. {} persons, {} reassigned, {} remapped, {} excluded, {} skipped, {} unchanged",
        summary.persons,
        summary.reassigned,
        summary.remapped,
        summary.excluded,
        summary.skipped,
        summary.unchanged
    );
    Ok(summary)
}

/// Collects the full `<person>` subtree, start and end tag included.
fn read_person_events(
    reader: &mut Reader<Box<dyn std::io::BufRead>>,
    start: BytesStart<'static>,
) -> Result<Vec<Event<'static>>, RewriteError> {
    let mut events = vec![Event::Start(start)];
    let mut depth = 1usize;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Eof => {
                return Err(RewriteError::Parse(String::from(
                    "unexpected end of document inside <person> element",
                )))
            }
            event => {
                match event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => depth -= 1,
                    _ => {}
                }
                events.push(event.into_owned());
                if depth == 0 {
                    return Ok(events);
                }
            }
        }
    }
}

fn process_person(
    events: &[Event<'static>],
    rewriter: &PlanRewriter,
    writer: &mut Writer<PopulationSink>,
) -> Result<RewriteOutcome, RewriteError> {
    let raw = events_to_string(events)?;
    let id = person_id(events);
    let mut person: IOPerson =
        quick_xml::de::from_str(&raw).map_err(|e| RewriteError::Parse(format!("person {id}: {e}")))?;

    let outcome = rewriter.rewrite_person(&mut person)?;
    if outcome.changes_person() {
        let serialized = serialize_person(&person)?;
        writer.get_mut().write_all(serialized.as_bytes())?;
    } else {
        // untouched persons stay byte-identical to the input
        for event in events {
            writer.write_event(event.clone())?;
        }
    }
    Ok(outcome)
}

fn events_to_string(events: &[Event<'static>]) -> Result<String, RewriteError> {
    let mut writer = Writer::new(Vec::new());
    for event in events {
        writer.write_event(event.clone())?;
    }
    String::from_utf8(writer.into_inner())
        .map_err(|e| RewriteError::Parse(format!("person element is not valid utf-8: {e}")))
}

fn person_id(events: &[Event<'static>]) -> String {
    let Some(Event::Start(start)) = events.first() else {
        return String::from("?");
    };
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"id")
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
        .unwrap_or_else(|| String::from("?"))
}

fn serialize_person(person: &IOPerson) -> Result<String, RewriteError> {
    let mut out = String::new();
    let mut ser = quick_xml::se::Serializer::with_root(&mut out, Some("person"))?;
    ser.indent('\t', 1);
    person.serialize(ser)?;
    Ok(out)
}
