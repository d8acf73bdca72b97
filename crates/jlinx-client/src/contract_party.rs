//! Contract party documents, owned by the responding party.
//!
//! A party ledger answers exactly one contract, once. Its first event names
//! the contract and whether the party signed or rejected it.

use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use jlinx_core::LedgerId;
use jlinx_ledger::Ledger;

use crate::client::JlinxClient;
use crate::contract::{Contract, ContractStatus};
use crate::error::{ContractError, Result};
use crate::machine::{AppliedEvent, EventMachine, EventSchema, LedgerResolver};
use crate::registry::{CompiledRegistry, EventRegistry, EventSpec, compiled};
use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PartyEvent {
    Signed { signer: String, contract_id: LedgerId },
    Rejected { signer: String, contract_id: LedgerId },
}

impl PartyEvent {
    pub fn contract_id(&self) -> &LedgerId {
        match self {
            PartyEvent::Signed { contract_id, .. } | PartyEvent::Rejected { contract_id, .. } => {
                contract_id
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PartyState {
    Uninitialized,
    Signed { contract_id: LedgerId, signer: String },
    Rejected { contract_id: LedgerId, signer: String },
}

impl PartyState {
    pub fn name(&self) -> &'static str {
        match self {
            PartyState::Uninitialized => "uninitialized",
            PartyState::Signed { .. } => "signed",
            PartyState::Rejected { .. } => "rejected",
        }
    }

    pub fn contract_id(&self) -> Option<&LedgerId> {
        match self {
            PartyState::Uninitialized => None,
            PartyState::Signed { contract_id, .. } | PartyState::Rejected { contract_id, .. } => {
                Some(contract_id)
            }
        }
    }

    pub fn signer(&self) -> Option<&str> {
        match self {
            PartyState::Uninitialized => None,
            PartyState::Signed { signer, .. } | PartyState::Rejected { signer, .. } => Some(signer),
        }
    }
}

fn resolution_schema() -> Schema {
    Schema::object()
        .with_property("signer", Schema::String)
        .with_property("contractId", Schema::String)
        .with_required(&["signer", "contractId"])
        .build()
}

static REGISTRY: CompiledRegistry = LazyLock::new(|| {
    EventRegistry::compile(vec![
        EventSpec::new("signed", resolution_schema()),
        EventSpec::new("rejected", resolution_schema()),
    ])
});

impl EventSchema for PartyEvent {
    type State = PartyState;

    const DOC_TYPE: &'static str = "ContractParty";
    const TAG: &'static str = "event";

    fn registry() -> Result<&'static EventRegistry> {
        compiled(&REGISTRY)
    }

    fn kind(&self) -> &'static str {
        match self {
            PartyEvent::Signed { .. } => "signed",
            PartyEvent::Rejected { .. } => "rejected",
        }
    }

    fn initial_state(_id: &LedgerId) -> PartyState {
        PartyState::Uninitialized
    }

    fn validate(&self, state: &PartyState) -> Option<String> {
        match state {
            PartyState::Uninitialized => None,
            _ => Some("already resolved".to_string()),
        }
    }

    fn apply(&self, _state: PartyState) -> PartyState {
        match self.clone() {
            PartyEvent::Signed { signer, contract_id } => PartyState::Signed { contract_id, signer },
            PartyEvent::Rejected { signer, contract_id } => {
                PartyState::Rejected { contract_id, signer }
            }
        }
    }
}

#[derive(Debug)]
pub struct ContractParty {
    machine: EventMachine<PartyEvent>,
    client: JlinxClient,
}

impl ContractParty {
    /// Create and initialize a new, unresolved party ledger.
    pub async fn create(client: JlinxClient) -> Result<Self> {
        let ledger = client.create_ledger().await?;
        let party = Self {
            machine: EventMachine::new(ledger, client.resolver())?,
            client,
        };
        party.machine.init(Map::new()).await?;
        Ok(party)
    }

    pub async fn open(ledger: Arc<dyn Ledger>, client: JlinxClient) -> Result<Self> {
        let resolver: Arc<dyn LedgerResolver> = client.resolver();
        Ok(Self {
            machine: EventMachine::open(ledger, resolver).await?,
            client,
        })
    }

    pub fn machine(&self) -> &EventMachine<PartyEvent> {
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

    pub fn state(&self) -> PartyState {
        self.machine.state()
    }

    pub fn events(&self) -> Vec<AppliedEvent<PartyEvent>> {
        self.machine.events()
    }

    pub fn contract_id(&self) -> Option<LedgerId> {
        self.state().contract_id().cloned()
    }

    pub fn signer(&self) -> Option<String> {
        self.state().signer().map(str::to_string)
    }

    pub async fn update(&self) -> Result<()> {
        self.machine.update().await
    }

    pub async fn wait_for_update(&self) -> Result<()> {
        self.machine.wait_for_update().await
    }

    /// Sign `contract` as `identifier`. The contract is only read.
    pub async fn sign(&self, identifier: &str, contract: &Contract) -> Result<()> {
        self.resolve(contract, PartyEvent::Signed {
            signer: identifier.to_string(),
            contract_id: contract.id().clone(),
        })
        .await
    }

    /// Reject `contract` as `identifier`. The contract is only read.
    pub async fn reject(&self, identifier: &str, contract: &Contract) -> Result<()> {
        self.resolve(contract, PartyEvent::Rejected {
            signer: identifier.to_string(),
            contract_id: contract.id().clone(),
        })
        .await
    }

    async fn resolve(&self, contract: &Contract, event: PartyEvent) -> Result<()> {
        contract.update().await?;
        let awaiting = match contract.status() {
            ContractStatus::Offered(_) => true,
            // acknowledged ahead of the resolution
            ContractStatus::Signed {
                signature_id,
                signer: None,
                ..
            } => &signature_id == self.id(),
            _ => false,
        };
        if !awaiting {
            return Err(ContractError::NotOffered(contract.id().to_string()).into());
        }

        self.machine.update().await?;
        if self.state() != PartyState::Uninitialized {
            return Err(ContractError::AlreadyResolved(self.id().to_string()).into());
        }

        self.machine.append(&event).await?;
        info!(
            party = %self.id().short_id(),
            contract = %contract.id().short_id(),
            resolution = event.kind(),
            "Resolved contract"
        );
        Ok(())
    }

    /// Open the contract named by this party's first event.
    pub async fn contract(&self) -> Result<Contract> {
        let contract_id = self
            .machine
            .events()
            .first()
            .map(|applied| applied.event.contract_id().clone())
            .ok_or_else(|| ContractError::NoContractId(self.id().to_string()))?;
        self.client.contracts().get(&contract_id).await
    }

    pub fn to_json(&self) -> Result<Value> {
        self.machine.to_json()
    }
}
