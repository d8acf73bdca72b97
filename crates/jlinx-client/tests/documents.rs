//! Integration tests for event-sourced documents over an in-process host.
//!
//! Tests cover:
//! - Replay determinism and convergence of independent readers
//! - Validation before any write (schema aggregation, unknown kinds, rules)
//! - Identifier services and the DID document projection
//! - Forward compatibility with unknown events
//! - Profiles
//! - Nested splices and stream purges through a custom document type
//! - Long-poll updates

use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use jlinx_client::registry::compiled;
use jlinx_client::{
    ClientError, CompiledRegistry, EventMachine, EventRegistry, EventSchema, EventSpec,
    IdentifierEvent, JlinxClient, Schema,
};
use jlinx_core::{LedgerId, Service, did_to_public_key};
use jlinx_ledger::{Host, Keyring, LedgerError, MemoryHost};

async fn client(host: &Arc<dyn Host>) -> JlinxClient {
    JlinxClient::connect(host.clone(), Arc::new(Keyring::new()))
        .await
        .unwrap()
}

fn memory_host() -> Arc<dyn Host> {
    jlinx_logging::init_testing();
    Arc::new(MemoryHost::new("memory://host"))
}

fn service(id: &str, endpoint: &str) -> Service {
    Service::new(id, "LinkedDomains", endpoint)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

// ============================================================
// Replay determinism
// ============================================================

#[tokio::test]
async fn test_replay_is_deterministic() {
    let host = memory_host();
    let alice = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();
    identifier.add_service(service("svc-1", "https://a")).await.unwrap();
    identifier.add_service(service("svc-2", "https://b")).await.unwrap();
    identifier.remove_service("svc-1").await.unwrap();

    let first = serde_json::to_string(&identifier.state()).unwrap();
    identifier.update().await.unwrap();
    let second = serde_json::to_string(&identifier.state()).unwrap();
    assert_eq!(first, second);

    // an independent reader converges on the same bytes
    let bob = client(&host).await;
    let seen = bob.identifiers().get(identifier.id()).await.unwrap();
    assert!(!seen.writable());
    assert_eq!(serde_json::to_string(&seen.state()).unwrap(), first);
    assert_eq!(seen.events(), identifier.events());
}

// ============================================================
// Validation precedes mutation
// ============================================================

#[tokio::test]
async fn test_invalid_payload_is_not_appended() {
    let host = memory_host();
    let alice = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();
    let length = identifier.length();

    let err = identifier
        .machine()
        .append_event("serviceAdded", json!({ "service": { "id": 7 }, "extra": true }))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::PayloadValidation(_)));
    assert_eq!(
        err.to_string(),
        "invalid event payload: must NOT have additional property 'extra', \
         /service must have required property 'type', \
         /service must have required property 'serviceEndpoint', \
         /service/id must be string"
    );

    identifier.update().await.unwrap();
    assert_eq!(identifier.length(), length);
}

#[tokio::test]
async fn test_unknown_kind_is_refused() {
    let host = memory_host();
    let alice = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();

    let err = identifier
        .machine()
        .append_event("serviceRenamed", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid event \"serviceRenamed\"");
    assert_eq!(identifier.length(), 1);
}

#[tokio::test]
async fn test_rule_violation_is_not_appended() {
    let host = memory_host();
    let alice = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();

    let err = identifier.remove_service("missing").await.unwrap_err();
    assert!(matches!(err, ClientError::Rule(_)));
    assert_eq!(
        err.to_string(),
        "service is not referenced by the did document: missing"
    );
    assert_eq!(identifier.length(), 1);
}

#[tokio::test]
async fn test_read_only_document_refuses_append() {
    let host = memory_host();
    let alice = client(&host).await;
    let bob = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();

    let seen = bob.identifiers().get(identifier.id()).await.unwrap();
    let err = seen.add_service(service("svc-1", "https://a")).await.unwrap_err();
    assert!(matches!(err, ClientError::Ledger(LedgerError::NotWritable(_))));
}

#[tokio::test]
async fn test_header_record_lifecycle() {
    let host = memory_host();
    let alice = client(&host).await;

    let ledger = alice.create_ledger().await.unwrap();
    let machine = EventMachine::<IdentifierEvent>::new(ledger, alice.resolver()).unwrap();

    let err = machine
        .append_event("serviceRemoved", json!({ "serviceId": "x" }))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotInitialized(_)));

    machine.init(Map::new()).await.unwrap();
    assert_eq!(machine.length(), 1);
    assert_eq!(machine.header_record().unwrap()["docType"], "Identifier");

    let err = machine.init(Map::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::AlreadyInitialized(_)));
}

// ============================================================
// Identifier services
// ============================================================

#[tokio::test]
async fn test_duplicate_service_is_refused() {
    let host = memory_host();
    let alice = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();

    identifier.add_service(service("svc-1", "https://a")).await.unwrap();
    let err = identifier
        .add_service(service("svc-1", "https://b"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rule(_)));
    assert_eq!(
        err.to_string(),
        "service already referenced by did document: svc-1"
    );

    let services = identifier.services();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].service_endpoint, "https://a");
}

#[tokio::test]
async fn test_remove_then_readd() {
    let host = memory_host();
    let alice = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();

    identifier.add_service(service("svc-1", "https://first")).await.unwrap();
    identifier.remove_service("svc-1").await.unwrap();
    assert!(identifier.services().is_empty());

    identifier.add_service(service("svc-1", "https://second")).await.unwrap();
    let services = identifier.services();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].id, "svc-1");
    assert_eq!(services[0].service_endpoint, "https://second");
}

#[tokio::test]
async fn test_did_document_projection() {
    let host = memory_host();
    let alice = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();
    identifier.add_service(service("svc-1", "https://a")).await.unwrap();

    let did = identifier.did();
    assert!(did.starts_with("did:key:z6mk"));
    assert_eq!(did_to_public_key(&did).unwrap(), identifier.signing_key());

    let document = identifier.as_did_document();
    assert_eq!(document.id, did);
    assert_eq!(document.verification_method[0].controller, did);
    assert_eq!(document.services, Some(identifier.services()));

    let json = identifier.to_json().unwrap();
    assert_eq!(json["did"], did);
    assert_eq!(json["docType"], "Identifier");
    assert_eq!(json["writable"], true);
}

// ============================================================
// Forward compatibility
// ============================================================

#[tokio::test]
async fn test_unknown_event_is_skipped() {
    let host = memory_host();
    let alice = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();
    identifier.add_service(service("svc-1", "https://a")).await.unwrap();

    // a newer client wrote a kind this one does not know
    let ledger = alice.open_ledger(identifier.id()).await.unwrap();
    ledger
        .append(
            vec![Bytes::from_static(br#"{"@event":"serviceRenamed","from":"a","to":"b"}"#)],
            None,
        )
        .await
        .unwrap();

    identifier.add_service(service("svc-2", "https://b")).await.unwrap();

    assert_eq!(identifier.length(), 4);
    let ids: Vec<_> = identifier.services().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["svc-1", "svc-2"]);

    let indices: Vec<_> = identifier.events().iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![1, 3]);
}

#[tokio::test]
async fn test_garbage_record_is_skipped() {
    let host = memory_host();
    let alice = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();

    let ledger = alice.open_ledger(identifier.id()).await.unwrap();
    ledger
        .append(vec![Bytes::from_static(b"\x00not json")], None)
        .await
        .unwrap();

    identifier.add_service(service("svc-1", "https://a")).await.unwrap();
    assert_eq!(identifier.services().len(), 1);
}

#[tokio::test]
async fn test_duplicate_written_behind_our_back_is_skipped() {
    let host = memory_host();
    let alice = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();
    identifier.add_service(service("svc-1", "https://first")).await.unwrap();

    let ledger = alice.open_ledger(identifier.id()).await.unwrap();
    let raced = json!({
        "@event": "serviceAdded",
        "service": { "id": "svc-1", "type": "LinkedDomains", "serviceEndpoint": "https://raced" }
    });
    ledger
        .append(vec![Bytes::from(serde_json::to_vec(&raced).unwrap())], None)
        .await
        .unwrap();

    identifier.update().await.unwrap();
    let services = identifier.services();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].service_endpoint, "https://first");
}

// ============================================================
// Profiles
// ============================================================

#[tokio::test]
async fn test_profile_set_and_get() {
    let host = memory_host();
    let alice = client(&host).await;
    let profile = alice
        .profiles()
        .create(Some("https://alice.example/profile"))
        .await
        .unwrap();
    assert_eq!(
        profile.service_endpoint().as_deref(),
        Some("https://alice.example/profile")
    );

    profile
        .set(object(json!({ "name": "Alice", "age": 30 })))
        .await
        .unwrap();
    profile
        .set(object(json!({ "age": null, "city": "Oslo" })))
        .await
        .unwrap();

    assert_eq!(profile.get("name"), Some(json!("Alice")));
    assert_eq!(profile.get("age"), None);
    assert_eq!(profile.get("city"), Some(json!("Oslo")));

    let bob = client(&host).await;
    let seen = bob.profiles().get(profile.id()).await.unwrap();
    assert_eq!(seen.state(), profile.state());
}

#[tokio::test]
async fn test_identifier_links_profile() {
    let host = memory_host();
    let alice = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();
    let profile = alice
        .profiles()
        .create(Some("https://alice.example/profile"))
        .await
        .unwrap();

    identifier.add_profile(&profile).await.unwrap();
    let services = identifier.services();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].id, profile.id().as_str());
    assert_eq!(services[0].service_type, "jlinx.profile");
    assert_eq!(services[0].service_endpoint, "https://alice.example/profile");
}

#[tokio::test]
async fn test_profile_without_endpoint_cannot_be_linked() {
    let host = memory_host();
    let alice = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();
    let profile = alice.profiles().create(None).await.unwrap();

    let err = identifier.add_profile(&profile).await.unwrap_err();
    assert!(matches!(err, ClientError::PayloadValidation(_)));
    assert!(err.to_string().contains("serviceEndpoint"));
}

// ============================================================
// Splicing through a custom document type
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum ThreadEvent {
    Posted { text: String },
    Linked { stream: LedgerId },
    Unlinked { stream: LedgerId },
}

static THREAD_REGISTRY: CompiledRegistry = LazyLock::new(|| {
    let stream = || {
        Schema::object()
            .with_property("stream", Schema::String)
            .with_required(&["stream"])
            .build()
    };
    EventRegistry::compile(vec![
        EventSpec::new(
            "posted",
            Schema::object()
                .with_property("text", Schema::String)
                .with_required(&["text"])
                .build(),
        ),
        EventSpec::new("linked", stream()),
        EventSpec::new("unlinked", stream()),
    ])
});

impl EventSchema for ThreadEvent {
    type State = Vec<String>;

    const DOC_TYPE: &'static str = "Thread";
    const TAG: &'static str = "kind";

    fn registry() -> jlinx_client::Result<&'static EventRegistry> {
        compiled(&THREAD_REGISTRY)
    }

    fn kind(&self) -> &'static str {
        match self {
            ThreadEvent::Posted { .. } => "posted",
            ThreadEvent::Linked { .. } => "linked",
            ThreadEvent::Unlinked { .. } => "unlinked",
        }
    }

    fn initial_state(_id: &LedgerId) -> Vec<String> {
        Vec::new()
    }

    fn apply(&self, mut state: Vec<String>) -> Vec<String> {
        if let ThreadEvent::Posted { text } = self {
            state.push(text.clone());
        }
        state
    }

    fn add_stream(&self, _state: &Vec<String>) -> Option<LedgerId> {
        match self {
            ThreadEvent::Linked { stream } => Some(stream.clone()),
            _ => None,
        }
    }

    fn remove_stream(&self, _state: &Vec<String>) -> Option<LedgerId> {
        match self {
            ThreadEvent::Unlinked { stream } => Some(stream.clone()),
            _ => None,
        }
    }
}

async fn thread(client: &JlinxClient) -> EventMachine<ThreadEvent> {
    let ledger = client.create_ledger().await.unwrap();
    let machine = EventMachine::new(ledger, client.resolver()).unwrap();
    machine.init(Map::new()).await.unwrap();
    machine
}

async fn post(thread: &EventMachine<ThreadEvent>, text: &str) {
    thread
        .append(&ThreadEvent::Posted { text: text.into() })
        .await
        .unwrap();
}

async fn link(thread: &EventMachine<ThreadEvent>, other: &EventMachine<ThreadEvent>) {
    thread
        .append(&ThreadEvent::Linked {
            stream: other.id().clone(),
        })
        .await
        .unwrap();
}

async fn unlink(thread: &EventMachine<ThreadEvent>, other: &EventMachine<ThreadEvent>) {
    thread
        .append(&ThreadEvent::Unlinked {
            stream: other.id().clone(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_nested_splices_run_in_queue_order() {
    let host = memory_host();
    let alice = client(&host).await;
    let root = thread(&alice).await;
    let p = thread(&alice).await;
    let q = thread(&alice).await;

    post(&q, "q1").await;
    post(&p, "p1").await;
    link(&p, &q).await;
    post(&p, "p2").await;

    post(&root, "a").await;
    link(&root, &p).await;
    post(&root, "b").await;

    assert_eq!(root.state(), vec!["a", "b", "p1", "p2", "q1"]);

    let streams: Vec<_> = root.events().into_iter().map(|e| e.stream).collect();
    assert_eq!(streams, vec![
        root.id().clone(),
        root.id().clone(),
        root.id().clone(),
        p.id().clone(),
        p.id().clone(),
        p.id().clone(),
        q.id().clone(),
    ]);
}

#[tokio::test]
async fn test_unlink_purges_pending_events() {
    let host = memory_host();
    let alice = client(&host).await;
    let root = thread(&alice).await;
    let p = thread(&alice).await;
    let q = thread(&alice).await;

    post(&q, "q1").await;
    unlink(&p, &q).await;
    post(&p, "p1").await;

    link(&root, &p).await;
    link(&root, &q).await;
    post(&root, "a").await;

    // p's unlink runs before any of q's events
    assert_eq!(root.state(), vec!["a", "p1"]);
}

#[tokio::test]
async fn test_splice_cycle_is_cut() {
    let host = memory_host();
    let alice = client(&host).await;
    let root = thread(&alice).await;
    let p = thread(&alice).await;

    post(&root, "a").await;
    link(&root, &p).await;
    post(&p, "p1").await;
    link(&p, &root).await;

    root.update().await.unwrap();
    assert_eq!(root.state(), vec!["a", "p1"]);
    assert_eq!(p.state(), vec!["p1", "a"]);
}

#[tokio::test]
async fn test_spliced_stream_growth_is_observed() {
    let host = memory_host();
    let alice = client(&host).await;
    let root = thread(&alice).await;
    let p = thread(&alice).await;

    link(&root, &p).await;
    assert!(root.state().is_empty());

    post(&p, "late").await;
    root.update().await.unwrap();
    assert_eq!(root.state(), vec!["late"]);
}

// ============================================================
// Long-poll updates
// ============================================================

#[tokio::test]
async fn test_reader_wakes_on_update() {
    let host = memory_host();
    let alice = client(&host).await;
    let bob = client(&host).await;
    let identifier = alice.identifiers().create().await.unwrap();
    let seen = bob.identifiers().get(identifier.id()).await.unwrap();

    let (waited, added) = tokio::join!(
        seen.wait_for_update(),
        identifier.add_service(service("svc-1", "https://a"))
    );
    waited.unwrap();
    added.unwrap();

    assert_eq!(seen.services().len(), 1);
}
