//! Identifier documents and their DID document projection.
//!
//! An identifier is a ledger whose owner key is the DID subject. Its events
//! maintain the `services` section of the DID document.

use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use jlinx_core::{DidDocument, LedgerId, PublicKey, Service, public_key_to_did, signing_key_to_did_document};
use jlinx_ledger::Ledger;

use crate::client::JlinxClient;
use crate::error::Result;
use crate::machine::{AppliedEvent, EventMachine, EventSchema, LedgerResolver};
use crate::profile::Profile;
use crate::registry::{CompiledRegistry, EventRegistry, EventSpec, compiled};
use crate::schema::Schema;

/// Service type of a profile linked from an identifier
pub const PROFILE_SERVICE_TYPE: &str = "jlinx.profile";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IdentifierEvent {
    ServiceAdded { service: Service },
    ServiceRemoved { service_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdentifierState {
    /// In insertion order; ids are unique
    pub services: Vec<Service>,
}

impl IdentifierState {
    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|service| service.id == id)
    }
}

static REGISTRY: CompiledRegistry = LazyLock::new(|| {
    EventRegistry::compile(vec![
        EventSpec::new(
            "serviceAdded",
            Schema::object()
                .with_property(
                    "service",
                    Schema::object()
                        .with_property("id", Schema::String)
                        .with_property("type", Schema::String)
                        .with_property("serviceEndpoint", Schema::String)
                        .with_required(&["id", "type", "serviceEndpoint"])
                        .with_additional_properties(true)
                        .build(),
                )
                .with_required(&["service"])
                .build(),
        ),
        EventSpec::new(
            "serviceRemoved",
            Schema::object()
                .with_property("serviceId", Schema::String)
                .with_required(&["serviceId"])
                .build(),
        ),
    ])
});

impl EventSchema for IdentifierEvent {
    type State = IdentifierState;

    const DOC_TYPE: &'static str = "Identifier";
    const TAG: &'static str = "@event";

    fn registry() -> Result<&'static EventRegistry> {
        compiled(&REGISTRY)
    }

    fn kind(&self) -> &'static str {
        match self {
            IdentifierEvent::ServiceAdded { .. } => "serviceAdded",
            IdentifierEvent::ServiceRemoved { .. } => "serviceRemoved",
        }
    }

    fn initial_state(_id: &LedgerId) -> IdentifierState {
        IdentifierState::default()
    }

    fn validate(&self, state: &IdentifierState) -> Option<String> {
        match self {
            IdentifierEvent::ServiceAdded { service } => state
                .service(&service.id)
                .map(|_| format!("service already referenced by did document: {}", service.id)),
            IdentifierEvent::ServiceRemoved { service_id } => match state.service(service_id) {
                Some(_) => None,
                None => Some(format!(
                    "service is not referenced by the did document: {}",
                    service_id
                )),
            },
        }
    }

    fn apply(&self, mut state: IdentifierState) -> IdentifierState {
        match self {
            IdentifierEvent::ServiceAdded { service } => state.services.push(service.clone()),
            IdentifierEvent::ServiceRemoved { service_id } => {
                state.services.retain(|service| &service.id != service_id)
            }
        }
        state
    }
}

/// Creates and opens identifiers.
#[derive(Debug, Clone)]
pub struct Identifiers {
    client: JlinxClient,
}

impl Identifiers {
    pub fn new(client: JlinxClient) -> Self {
        Self { client }
    }

    pub async fn create(&self) -> Result<Identifier> {
        let ledger = self.client.create_ledger().await?;
        let identifier = Identifier::new(ledger, self.client.resolver())?;
        identifier.machine.init(Map::new()).await?;
        debug!(did = %identifier.did(), "Created identifier");
        Ok(identifier)
    }

    pub async fn get(&self, id: &LedgerId) -> Result<Identifier> {
        let ledger = self.client.open_ledger(id).await?;
        Identifier::open(ledger, self.client.resolver()).await
    }
}

#[derive(Debug)]
pub struct Identifier {
    machine: EventMachine<IdentifierEvent>,
}

impl Identifier {
    fn new(ledger: Arc<dyn Ledger>, resolver: Arc<dyn LedgerResolver>) -> Result<Self> {
        Ok(Self {
            machine: EventMachine::new(ledger, resolver)?,
        })
    }

    pub async fn open(ledger: Arc<dyn Ledger>, resolver: Arc<dyn LedgerResolver>) -> Result<Self> {
        Ok(Self {
            machine: EventMachine::open(ledger, resolver).await?,
        })
    }

    pub fn machine(&self) -> &EventMachine<IdentifierEvent> {
        &self.machine
    }

    pub fn id(&self) -> &LedgerId {
        self.machine.id()
    }

    pub fn writable(&self) -> bool {
        self.machine.writable()
    }

    pub fn length(&self) -> u64 {
        self.machine.length()
    }

    /// Owner signing key of the ledger, the DID subject key
    pub fn signing_key(&self) -> PublicKey {
        self.machine.ledger().header().owner_signing_key
    }

    pub fn did(&self) -> String {
        public_key_to_did(&self.signing_key())
    }

    pub fn state(&self) -> IdentifierState {
        self.machine.state()
    }

    pub fn services(&self) -> Vec<Service> {
        self.machine.state().services
    }

    pub fn events(&self) -> Vec<AppliedEvent<IdentifierEvent>> {
        self.machine.events()
    }

    pub async fn update(&self) -> Result<()> {
        self.machine.update().await
    }

    pub async fn wait_for_update(&self) -> Result<()> {
        self.machine.wait_for_update().await
    }

    pub async fn add_service(&self, service: Service) -> Result<()> {
        self.machine
            .append(&IdentifierEvent::ServiceAdded { service })
            .await
    }

    pub async fn remove_service(&self, service_id: &str) -> Result<()> {
        self.machine
            .append(&IdentifierEvent::ServiceRemoved {
                service_id: service_id.to_string(),
            })
            .await
    }

    /// Link a profile as a `jlinx.profile` service.
    pub async fn add_profile(&self, profile: &Profile) -> Result<()> {
        let mut service = Map::new();
        service.insert("id".into(), Value::String(profile.id().to_string()));
        service.insert("type".into(), Value::String(PROFILE_SERVICE_TYPE.into()));
        if let Some(endpoint) = profile.service_endpoint() {
            service.insert("serviceEndpoint".into(), Value::String(endpoint));
        }
        self.machine
            .append_event("serviceAdded", json!({ "service": service }))
            .await
    }

    pub fn as_did_document(&self) -> DidDocument {
        let services = self.services();
        signing_key_to_did_document(&self.signing_key(), Some(services.as_slice()))
    }

    pub fn to_json(&self) -> Result<Value> {
        let mut value = self.machine.to_json()?;
        if let Value::Object(map) = &mut value {
            map.insert("did".into(), Value::String(self.did()));
        }
        Ok(value)
    }
}
