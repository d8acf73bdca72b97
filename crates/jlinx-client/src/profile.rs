//! Profile documents: an open key/value record merged by `update` events.

use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use jlinx_core::LedgerId;
use jlinx_ledger::Ledger;

use crate::client::JlinxClient;
use crate::error::Result;
use crate::machine::{AppliedEvent, EventMachine, EventSchema, LedgerResolver};
use crate::registry::{CompiledRegistry, EventRegistry, EventSpec, compiled};
use crate::schema::Schema;

/// Header field naming the endpoint that serves the profile
pub const SERVICE_ENDPOINT_FIELD: &str = "serviceEndpoint";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@event", rename_all = "camelCase")]
pub enum ProfileEvent {
    /// Merge changes into the profile; a `null` value deletes the key
    Update(Map<String, Value>),
}

pub type ProfileState = Map<String, Value>;

static REGISTRY: CompiledRegistry = LazyLock::new(|| {
    EventRegistry::compile(vec![EventSpec::new(
        "update",
        Schema::object().with_additional_properties(true).build(),
    )])
});

impl EventSchema for ProfileEvent {
    type State = ProfileState;

    const DOC_TYPE: &'static str = "Profile";
    const TAG: &'static str = "@event";

    fn registry() -> Result<&'static EventRegistry> {
        compiled(&REGISTRY)
    }

    fn kind(&self) -> &'static str {
        match self {
            ProfileEvent::Update(_) => "update",
        }
    }

    fn initial_state(_id: &LedgerId) -> ProfileState {
        Map::new()
    }

    fn apply(&self, mut state: ProfileState) -> ProfileState {
        let ProfileEvent::Update(changes) = self;
        for (key, value) in changes {
            if value.is_null() {
                state.remove(key);
            } else {
                state.insert(key.clone(), value.clone());
            }
        }
        state
    }
}

#[derive(Debug, Clone)]
pub struct Profiles {
    client: JlinxClient,
}

impl Profiles {
    pub fn new(client: JlinxClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, service_endpoint: Option<&str>) -> Result<Profile> {
        let ledger = self.client.create_ledger().await?;
        let profile = Profile {
            machine: EventMachine::new(ledger, self.client.resolver())?,
        };

        let mut header = Map::new();
        if let Some(endpoint) = service_endpoint {
            header.insert(SERVICE_ENDPOINT_FIELD.into(), Value::String(endpoint.into()));
        }
        profile.machine.init(header).await?;
        Ok(profile)
    }

    pub async fn get(&self, id: &LedgerId) -> Result<Profile> {
        let ledger = self.client.open_ledger(id).await?;
        Profile::open(ledger, self.client.resolver()).await
    }
}

#[derive(Debug)]
pub struct Profile {
    machine: EventMachine<ProfileEvent>,
}

impl Profile {
    pub async fn open(ledger: Arc<dyn Ledger>, resolver: Arc<dyn LedgerResolver>) -> Result<Self> {
        Ok(Self {
            machine: EventMachine::open(ledger, resolver).await?,
        })
    }

    pub fn machine(&self) -> &EventMachine<ProfileEvent> {
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

    pub fn service_endpoint(&self) -> Option<String> {
        self.machine
            .header_record()?
            .get(SERVICE_ENDPOINT_FIELD)?
            .as_str()
            .map(str::to_string)
    }

    pub fn state(&self) -> ProfileState {
        self.machine.state()
    }

    pub fn events(&self) -> Vec<AppliedEvent<ProfileEvent>> {
        self.machine.events()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.machine.state().get(key).cloned()
    }

    pub async fn set(&self, changes: Map<String, Value>) -> Result<()> {
        self.machine.append(&ProfileEvent::Update(changes)).await
    }

    pub async fn update(&self) -> Result<()> {
        self.machine.update().await
    }

    pub async fn wait_for_update(&self) -> Result<()> {
        self.machine.wait_for_update().await
    }

    pub fn to_json(&self) -> Result<Value> {
        self.machine.to_json()
    }
}
