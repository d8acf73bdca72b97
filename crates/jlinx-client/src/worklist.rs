//! Replay worklist.
//!
//! The queue of event sources a replay still has to consume. Each source is
//! one stream (a ledger id) with its records and a cursor. The root ledger
//! is the first source; a splice appends another stream at the tail, so the
//! current stream finishes before the spliced one starts. A purge drops
//! whatever is still pending from a stream.

use std::collections::{HashSet, VecDeque};

use bytes::Bytes;

use jlinx_core::LedgerId;

/// One record waiting to be replayed
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub stream: LedgerId,
    /// Index of the record within its own ledger
    pub index: u64,
    pub record: Bytes,
}

#[derive(Debug)]
struct PendingSource {
    stream: LedgerId,
    first_index: u64,
    records: Vec<Bytes>,
    cursor: usize,
}

impl PendingSource {
    fn remaining(&self) -> usize {
        self.records.len() - self.cursor
    }
}

#[derive(Debug, Default)]
pub struct Worklist {
    sources: VecDeque<PendingSource>,
    /// Every stream ever queued; a stream is spliced at most once
    seen: HashSet<LedgerId>,
}

impl Worklist {
    /// Start with the root stream, whose first record sits at `first_index`.
    pub fn new(root: LedgerId, first_index: u64, records: Vec<Bytes>) -> Self {
        let mut worklist = Self::default();
        worklist.push(root, first_index, records);
        worklist
    }

    /// Queue a stream behind everything already pending.
    ///
    /// Returns `false`, queuing nothing, when the stream was already part of
    /// this replay.
    pub fn splice(&mut self, stream: LedgerId, first_index: u64, records: Vec<Bytes>) -> bool {
        if self.seen.contains(&stream) {
            return false;
        }
        self.push(stream, first_index, records);
        true
    }

    fn push(&mut self, stream: LedgerId, first_index: u64, records: Vec<Bytes>) {
        self.seen.insert(stream.clone());
        self.sources.push_back(PendingSource {
            stream,
            first_index,
            records,
            cursor: 0,
        });
    }

    /// Drop every pending record of `stream`, returning how many were dropped.
    pub fn purge(&mut self, stream: &LedgerId) -> usize {
        let mut dropped = 0;
        self.sources.retain(|source| {
            if &source.stream == stream {
                dropped += source.remaining();
                false
            } else {
                true
            }
        });
        dropped
    }

    pub fn has_seen(&self, stream: &LedgerId) -> bool {
        self.seen.contains(stream)
    }

    /// Records still pending across all sources
    pub fn len(&self) -> usize {
        self.sources.iter().map(PendingSource::remaining).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for Worklist {
    type Item = PendingEvent;

    fn next(&mut self) -> Option<PendingEvent> {
        loop {
            let source = self.sources.front_mut()?;
            if let Some(record) = source.records.get(source.cursor) {
                let event = PendingEvent {
                    stream: source.stream.clone(),
                    index: source.first_index + source.cursor as u64,
                    record: record.clone(),
                };
                source.cursor += 1;
                return Some(event);
            }
            self.sources.pop_front();
        }
    }
}
