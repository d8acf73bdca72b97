//! EventMachine: turns one ledger plus a compiled event registry into a live,
//! queryable state machine.
//!
//! Record 0 of every document ledger is a header record naming the document
//! type. Every later record is one tagged event. `update()` re-reads the
//! ledger and replays its events from the initial state; an event may splice
//! another ledger's events into the ongoing replay, or purge a spliced
//! stream's pending events.
//!
//! Appends are validated against a freshly replayed state and serialized per
//! machine. Replay re-runs every business rule too, so when two writers race
//! past each other the event that landed first wins and the loser is skipped
//! deterministically by every reader.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, warn};

use jlinx_core::LedgerId;
use jlinx_ledger::{Ledger, LedgerError};
use jlinx_logging::{document_span, replay_span};

use crate::error::{ClientError, Result};
use crate::registry::EventRegistry;
use crate::schema;
use crate::worklist::{PendingEvent, Worklist};

/// Header record field naming the document type
pub const DOC_TYPE_FIELD: &str = "docType";

/// Where an event kind may come from during replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    Any,
    /// Only accepted from a spliced stream, never from the document's own
    /// ledger, and never appended directly
    Spliced,
}

/// The closed set of events of one document type.
///
/// Implementations are serde enums tagged with [`EventSchema::TAG`]; the
/// tag value of each variant is its kind.
pub trait EventSchema:
    Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static
{
    type State: Clone + Serialize + Debug + Send + Sync + 'static;

    /// Value of the header record's `docType` field
    const DOC_TYPE: &'static str;

    /// Record field carrying the event kind
    const TAG: &'static str;

    /// Compiled payload schemas, one per kind
    fn registry() -> Result<&'static EventRegistry>;

    fn kind(&self) -> &'static str;

    fn initial_state(id: &LedgerId) -> Self::State;

    /// Business rule against the current state; a message blocks the event
    fn validate(&self, _state: &Self::State) -> Option<String> {
        None
    }

    fn apply(&self, state: Self::State) -> Self::State {
        state
    }

    /// Stream to splice into the replay after this event is applied
    fn add_stream(&self, _state: &Self::State) -> Option<LedgerId> {
        None
    }

    /// Stream whose pending events this event purges
    fn remove_stream(&self, _state: &Self::State) -> Option<LedgerId> {
        None
    }

    fn origin(&self) -> EventOrigin {
        EventOrigin::Any
    }
}

/// Opens ledgers referenced by spliced streams.
#[async_trait]
pub trait LedgerResolver: Send + Sync {
    async fn open_ledger(&self, id: &LedgerId) -> Result<Arc<dyn Ledger>>;
}

/// An event that was applied during the last replay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedEvent<E> {
    /// Ledger the event was read from
    pub stream: LedgerId,
    pub index: u64,
    pub event: E,
}

struct Snapshot<E: EventSchema> {
    state: E::State,
    events: Vec<AppliedEvent<E>>,
    /// Ledger length covered by this replay, header included
    length: u64,
    header: Option<Map<String, Value>>,
}

pub struct EventMachine<E: EventSchema> {
    ledger: Arc<dyn Ledger>,
    resolver: Arc<dyn LedgerResolver>,
    registry: &'static EventRegistry,
    snapshot: RwLock<Snapshot<E>>,
    /// Serializes local read-validate-append sequences
    append_lock: Mutex<()>,
}

impl<E: EventSchema> EventMachine<E> {
    /// Wrap a ledger without reading it. Call [`EventMachine::update`] before
    /// relying on state.
    pub fn new(ledger: Arc<dyn Ledger>, resolver: Arc<dyn LedgerResolver>) -> Result<Self> {
        let registry = E::registry()?;
        let state = E::initial_state(ledger.id());
        Ok(Self {
            ledger,
            resolver,
            registry,
            snapshot: RwLock::new(Snapshot {
                state,
                events: Vec::new(),
                length: 0,
                header: None,
            }),
            append_lock: Mutex::new(()),
        })
    }

    /// Wrap a ledger and replay it.
    pub async fn open(ledger: Arc<dyn Ledger>, resolver: Arc<dyn LedgerResolver>) -> Result<Self> {
        let machine = Self::new(ledger, resolver)?;
        machine.update().await?;
        Ok(machine)
    }

    pub fn id(&self) -> &LedgerId {
        self.ledger.id()
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn writable(&self) -> bool {
        self.ledger.writable()
    }

    /// Ledger length covered by the last replay, header included
    pub fn length(&self) -> u64 {
        self.snapshot.read().length
    }

    pub fn state(&self) -> E::State {
        self.snapshot.read().state.clone()
    }

    /// Events applied by the last replay, in replay order
    pub fn events(&self) -> Vec<AppliedEvent<E>> {
        self.snapshot.read().events.clone()
    }

    /// The header record written by [`EventMachine::init`]
    pub fn header_record(&self) -> Option<Map<String, Value>> {
        self.snapshot.read().header.clone()
    }

    pub fn to_json(&self) -> Result<Value> {
        let snapshot = self.snapshot.read();
        let mut out = Map::new();
        out.insert("id".into(), Value::String(self.id().to_string()));
        out.insert(DOC_TYPE_FIELD.into(), Value::String(E::DOC_TYPE.into()));
        out.insert("writable".into(), Value::Bool(self.writable()));
        out.insert("length".into(), Value::from(snapshot.length));
        out.insert(
            "header".into(),
            snapshot.header.clone().map(Value::Object).unwrap_or(Value::Null),
        );
        out.insert("state".into(), serde_json::to_value(&snapshot.state)?);
        out.insert("events".into(), serde_json::to_value(&snapshot.events)?);
        Ok(Value::Object(out))
    }

    /// Write the header record `{docType, ...options}` to an empty ledger.
    pub async fn init(&self, options: Map<String, Value>) -> Result<()> {
        let span = document_span(E::DOC_TYPE, self.id().as_str());
        async {
            let _guard = self.append_lock.lock().await;

            if self.ledger.update().await? > 0 {
                return Err(ClientError::AlreadyInitialized(self.id().to_string()));
            }

            let mut header = options;
            header.insert(DOC_TYPE_FIELD.into(), Value::String(E::DOC_TYPE.into()));
            let record = serde_json::to_vec(&header)?;
            self.ledger.append(vec![Bytes::from(record)], Some(0)).await?;
            debug!("Initialized document");

            self.replay().await
        }
        .instrument(span)
        .await
    }

    /// Refresh the ledger and replay it from the initial state.
    pub async fn update(&self) -> Result<()> {
        self.replay()
            .instrument(replay_span(E::DOC_TYPE, self.id().as_str()))
            .await
    }

    /// Suspend until the ledger grows, then replay.
    pub async fn wait_for_update(&self) -> Result<()> {
        self.ledger.wait_for_update().await?;
        self.update().await
    }

    /// Validate and append an event given by kind and untagged payload.
    pub async fn append_event(&self, kind: &str, payload: Value) -> Result<()> {
        let span = document_span(E::DOC_TYPE, self.id().as_str());
        self.append_inner(kind, payload).instrument(span).await
    }

    /// Validate and append a typed event.
    pub async fn append(&self, event: &E) -> Result<()> {
        let mut payload = serde_json::to_value(event)?;
        if let Value::Object(map) = &mut payload {
            map.remove(E::TAG);
        }
        self.append_event(event.kind(), payload).await
    }

    async fn append_inner(&self, kind: &str, payload: Value) -> Result<()> {
        let schema = self
            .registry
            .schema(kind)
            .ok_or_else(|| ClientError::InvalidEventKind(kind.to_string()))?;

        let violations = schema.validate(&payload);
        if !violations.is_empty() {
            return Err(ClientError::PayloadValidation(schema::describe(&violations)));
        }

        let mut record = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ClientError::PayloadValidation("must be object".into())),
        };
        record.insert(E::TAG.into(), Value::String(kind.to_string()));
        let record = Value::Object(record);

        let event: E = serde_json::from_value(record.clone())
            .map_err(|e| ClientError::PayloadValidation(e.to_string()))?;

        if event.origin() == EventOrigin::Spliced {
            return Err(ClientError::Rule(format!(
                "event \"{}\" is only accepted from a spliced stream",
                kind
            )));
        }

        if !self.writable() {
            return Err(LedgerError::NotWritable(self.id().clone()).into());
        }

        let _guard = self.append_lock.lock().await;
        self.replay().await?;

        let (length, rejection) = {
            let snapshot = self.snapshot.read();
            (snapshot.length, event.validate(&snapshot.state))
        };
        if length == 0 {
            return Err(ClientError::NotInitialized(self.id().to_string()));
        }
        if let Some(reason) = rejection {
            debug!(kind, reason = %reason, "Event refused");
            return Err(ClientError::Rule(reason));
        }

        let bytes = serde_json::to_vec(&record)?;
        self.ledger.append(vec![Bytes::from(bytes)], Some(length)).await?;
        debug!(kind, index = length, "Appended event");

        self.replay().await
    }

    async fn replay(&self) -> Result<()> {
        self.ledger.update().await?;
        let records = self.ledger.entries().await?;
        let length = records.len() as u64;

        let mut records = records.into_iter();
        let header = records.next().and_then(|record| self.read_header(&record));

        let mut state = E::initial_state(self.id());
        let mut applied = Vec::new();
        let mut worklist = Worklist::new(self.id().clone(), 1, records.collect());

        while let Some(pending) = worklist.next() {
            let Some(event) = self.decode(&pending) else {
                continue;
            };

            if &pending.stream == self.id() && event.origin() == EventOrigin::Spliced {
                warn!(
                    index = pending.index,
                    kind = event.kind(),
                    "Skipping event only valid from a spliced stream"
                );
                continue;
            }

            if let Some(reason) = event.validate(&state) {
                warn!(
                    stream = %pending.stream.short_id(),
                    index = pending.index,
                    kind = event.kind(),
                    reason = %reason,
                    "Skipping event rejected by replayed state"
                );
                continue;
            }

            state = event.apply(state);

            if let Some(stream) = event.add_stream(&state) {
                self.splice(&mut worklist, stream).await?;
            }
            if let Some(stream) = event.remove_stream(&state) {
                let dropped = worklist.purge(&stream);
                debug!(stream = %stream.short_id(), dropped, "Purged stream");
            }

            applied.push(AppliedEvent {
                stream: pending.stream,
                index: pending.index,
                event,
            });
        }

        let count = applied.len();
        let mut snapshot = self.snapshot.write();
        // A slower concurrent replay must not roll state back
        if length >= snapshot.length {
            *snapshot = Snapshot {
                state,
                events: applied,
                length,
                header,
            };
        }
        debug!(length, events = count, "Replayed document");
        Ok(())
    }

    async fn splice(&self, worklist: &mut Worklist, stream: LedgerId) -> Result<()> {
        if worklist.has_seen(&stream) {
            warn!(stream = %stream.short_id(), "Stream already part of this replay, not spliced again");
            return Ok(());
        }

        let ledger = match self.resolver.open_ledger(&stream).await {
            Ok(ledger) => ledger,
            Err(ClientError::Ledger(LedgerError::NotFound(what))) => {
                warn!(stream = %stream.short_id(), missing = %what, "Spliced stream not found, skipping");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        ledger.update().await?;
        let records: Vec<Bytes> = ledger.entries().await?.into_iter().skip(1).collect();

        debug!(stream = %stream.short_id(), records = records.len(), "Splicing stream");
        worklist.splice(stream, 1, records);
        Ok(())
    }

    fn read_header(&self, record: &[u8]) -> Option<Map<String, Value>> {
        match serde_json::from_slice::<Value>(record) {
            Ok(Value::Object(header)) => {
                let doc_type = header.get(DOC_TYPE_FIELD).and_then(Value::as_str);
                if doc_type != Some(E::DOC_TYPE) {
                    warn!(expected = E::DOC_TYPE, found = ?doc_type, "Header names another document type");
                }
                Some(header)
            }
            _ => {
                warn!("Header record is not a JSON object");
                None
            }
        }
    }

    fn decode(&self, pending: &PendingEvent) -> Option<E> {
        let stream = pending.stream.short_id();
        let value: Value = match serde_json::from_slice(&pending.record) {
            Ok(value) => value,
            Err(e) => {
                warn!(stream, index = pending.index, error = %e, "Skipping undecodable record");
                return None;
            }
        };

        let kind = value
            .get(E::TAG)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let kind = kind.as_str();
        let mut payload = value.clone();
        if let Value::Object(map) = &mut payload {
            map.remove(E::TAG);
        }

        match self.registry.check_payload(kind, &payload) {
            None => {
                warn!(stream, index = pending.index, kind, "Ignoring unknown event");
                return None;
            }
            Some(violations) if !violations.is_empty() => {
                warn!(stream, index = pending.index, kind, violations = %violations, "Skipping event with invalid payload");
                return None;
            }
            Some(_) => {}
        }

        match serde_json::from_value(value) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(stream, index = pending.index, kind, error = %e, "Skipping undecodable event");
                None
            }
        }
    }
}

impl<E: EventSchema> Debug for EventMachine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventMachine")
            .field("doc_type", &E::DOC_TYPE)
            .field("id", self.id())
            .field("writable", &self.writable())
            .field("length", &self.length())
            .finish()
    }
}
