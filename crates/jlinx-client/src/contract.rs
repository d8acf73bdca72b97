//! Contract documents, owned by the offering party.
//!
//! Lifecycle: `offered` is written once by the offerer. A responder answers
//! by creating its own [`ContractParty`] ledger and resolving it. The offerer
//! then acknowledges the response with `signerResponded`, which splices the
//! party ledger into every replay of the contract. Readers of both ledgers
//! converge on the same joint state without sharing write access.

use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use jlinx_core::LedgerId;
use jlinx_ledger::{Ledger, LedgerError};

use crate::client::JlinxClient;
use crate::contract_party::{ContractParty, PartyEvent};
use crate::error::{ClientError, ContractError, Result};
use crate::machine::{
    AppliedEvent, DOC_TYPE_FIELD, EventMachine, EventOrigin, EventSchema, LedgerResolver,
};
use crate::registry::{CompiledRegistry, EventRegistry, EventSpec, compiled};
use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ContractEvent {
    Offered {
        offerer: String,
        contract_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature_dropoff_url: Option<String>,
        jlinx_host: String,
    },
    /// The offerer acknowledges a response; splices the party ledger
    SignerResponded { contract_response_id: LedgerId },
    /// Written to a party ledger, seen here through the splice
    Signed { signer: String, contract_id: LedgerId },
    /// Written to a party ledger, seen here through the splice
    Rejected { signer: String, contract_id: LedgerId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub offerer: String,
    pub contract_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_dropoff_url: Option<String>,
    pub jlinx_host: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ContractStatus {
    Uninitialized,
    Offered(Offer),
    /// A response was acknowledged; `signer` is known once the party
    /// ledger's resolution has been replayed
    Signed {
        #[serde(flatten)]
        offer: Offer,
        signature_id: LedgerId,
        #[serde(skip_serializing_if = "Option::is_none")]
        signer: Option<String>,
    },
    Rejected {
        #[serde(flatten)]
        offer: Offer,
        signature_id: LedgerId,
        signer: String,
    },
}

impl ContractStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ContractStatus::Uninitialized => "uninitialized",
            ContractStatus::Offered(_) => "offered",
            ContractStatus::Signed { .. } => "signed",
            ContractStatus::Rejected { .. } => "rejected",
        }
    }

    pub fn offer(&self) -> Option<&Offer> {
        match self {
            ContractStatus::Uninitialized => None,
            ContractStatus::Offered(offer)
            | ContractStatus::Signed { offer, .. }
            | ContractStatus::Rejected { offer, .. } => Some(offer),
        }
    }

    pub fn signature_id(&self) -> Option<&LedgerId> {
        match self {
            ContractStatus::Signed { signature_id, .. }
            | ContractStatus::Rejected { signature_id, .. } => Some(signature_id),
            _ => None,
        }
    }

    pub fn signer(&self) -> Option<&str> {
        match self {
            ContractStatus::Signed { signer, .. } => signer.as_deref(),
            ContractStatus::Rejected { signer, .. } => Some(signer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractState {
    pub contract_id: LedgerId,
    #[serde(flatten)]
    pub status: ContractStatus,
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
        EventSpec::new(
            "offered",
            Schema::object()
                .with_property("offerer", Schema::String)
                .with_property("contractUrl", Schema::String)
                .with_property("signatureDropoffUrl", Schema::String)
                .with_property("jlinxHost", Schema::String)
                .with_required(&["offerer", "contractUrl", "jlinxHost"])
                .build(),
        ),
        EventSpec::new(
            "signerResponded",
            Schema::object()
                .with_property("contractResponseId", Schema::String)
                .with_required(&["contractResponseId"])
                .build(),
        ),
        EventSpec::new("signed", resolution_schema()),
        EventSpec::new("rejected", resolution_schema()),
    ])
});

impl EventSchema for ContractEvent {
    type State = ContractState;

    const DOC_TYPE: &'static str = "Contract";
    const TAG: &'static str = "event";

    fn registry() -> Result<&'static EventRegistry> {
        compiled(&REGISTRY)
    }

    fn kind(&self) -> &'static str {
        match self {
            ContractEvent::Offered { .. } => "offered",
            ContractEvent::SignerResponded { .. } => "signerResponded",
            ContractEvent::Signed { .. } => "signed",
            ContractEvent::Rejected { .. } => "rejected",
        }
    }

    fn initial_state(id: &LedgerId) -> ContractState {
        ContractState {
            contract_id: id.clone(),
            status: ContractStatus::Uninitialized,
        }
    }

    fn validate(&self, state: &ContractState) -> Option<String> {
        match (self, &state.status) {
            (ContractEvent::Offered { .. }, ContractStatus::Uninitialized) => None,
            (ContractEvent::Offered { .. }, _) => Some(ContractError::AlreadyOffered.to_string()),
            (ContractEvent::SignerResponded { .. }, ContractStatus::Offered(_)) => None,
            (ContractEvent::SignerResponded { .. }, _) => {
                Some(ContractError::CannotAcknowledge.to_string())
            }
            (
                ContractEvent::Signed { contract_id, .. } | ContractEvent::Rejected { contract_id, .. },
                ContractStatus::Signed { signer: None, .. },
            ) => (contract_id != &state.contract_id)
                .then(|| format!("contract response answers another contract: {}", contract_id)),
            (ContractEvent::Signed { .. } | ContractEvent::Rejected { .. }, _) => {
                Some("contract is not awaiting a response".to_string())
            }
        }
    }

    fn apply(&self, mut state: ContractState) -> ContractState {
        let status = std::mem::replace(&mut state.status, ContractStatus::Uninitialized);
        state.status = match (self, status) {
            (
                ContractEvent::Offered {
                    offerer,
                    contract_url,
                    signature_dropoff_url,
                    jlinx_host,
                },
                _,
            ) => ContractStatus::Offered(Offer {
                offerer: offerer.clone(),
                contract_url: contract_url.clone(),
                signature_dropoff_url: signature_dropoff_url.clone(),
                jlinx_host: jlinx_host.clone(),
            }),
            (ContractEvent::SignerResponded { contract_response_id }, ContractStatus::Offered(offer)) => {
                ContractStatus::Signed {
                    offer,
                    signature_id: contract_response_id.clone(),
                    signer: None,
                }
            }
            (
                ContractEvent::Signed { signer, .. },
                ContractStatus::Signed {
                    offer, signature_id, ..
                },
            ) => ContractStatus::Signed {
                offer,
                signature_id,
                signer: Some(signer.clone()),
            },
            (
                ContractEvent::Rejected { signer, .. },
                ContractStatus::Signed {
                    offer, signature_id, ..
                },
            ) => ContractStatus::Rejected {
                offer,
                signature_id,
                signer: signer.clone(),
            },
            // refused by validate
            (_, status) => status,
        };
        state
    }

    fn add_stream(&self, _state: &ContractState) -> Option<LedgerId> {
        match self {
            ContractEvent::SignerResponded {
                contract_response_id,
            } => Some(contract_response_id.clone()),
            _ => None,
        }
    }

    fn origin(&self) -> EventOrigin {
        match self {
            ContractEvent::Signed { .. } | ContractEvent::Rejected { .. } => EventOrigin::Spliced,
            _ => EventOrigin::Any,
        }
    }
}

/// Terms of an offer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferOptions {
    pub offerer: String,
    pub contract_url: String,
    pub signature_dropoff_url: Option<String>,
}

impl OfferOptions {
    pub fn new(offerer: impl Into<String>, contract_url: impl Into<String>) -> Self {
        Self {
            offerer: offerer.into(),
            contract_url: contract_url.into(),
            signature_dropoff_url: None,
        }
    }

    pub fn with_signature_dropoff_url(mut self, url: impl Into<String>) -> Self {
        self.signature_dropoff_url = Some(url.into());
        self
    }
}

/// Creates and opens contracts and contract parties.
#[derive(Debug, Clone)]
pub struct Contracts {
    client: JlinxClient,
}

impl Contracts {
    pub fn new(client: JlinxClient) -> Self {
        Self { client }
    }

    pub async fn create(&self) -> Result<Contract> {
        let ledger = self.client.create_ledger().await?;
        let contract = Contract {
            machine: EventMachine::new(ledger, self.client.resolver())?,
            client: self.client.clone(),
        };
        contract.machine.init(Map::new()).await?;
        debug!(contract = %contract.id().short_id(), "Created contract");
        Ok(contract)
    }

    pub async fn get(&self, id: &LedgerId) -> Result<Contract> {
        let ledger = self.client.open_ledger(id).await?;
        Contract::open(ledger, self.client.clone()).await
    }

    pub async fn create_party(&self) -> Result<ContractParty> {
        ContractParty::create(self.client.clone()).await
    }

    pub async fn get_party(&self, id: &LedgerId) -> Result<ContractParty> {
        let ledger = self.client.open_ledger(id).await?;
        ContractParty::open(ledger, self.client.clone()).await
    }
}

#[derive(Debug)]
pub struct Contract {
    machine: EventMachine<ContractEvent>,
    client: JlinxClient,
}

impl Contract {
    pub async fn open(ledger: Arc<dyn Ledger>, client: JlinxClient) -> Result<Self> {
        let resolver: Arc<dyn LedgerResolver> = client.resolver();
        Ok(Self {
            machine: EventMachine::open(ledger, resolver).await?,
            client,
        })
    }

    pub fn machine(&self) -> &EventMachine<ContractEvent> {
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

    pub fn state(&self) -> ContractState {
        self.machine.state()
    }

    pub fn status(&self) -> ContractStatus {
        self.machine.state().status
    }

    pub fn events(&self) -> Vec<AppliedEvent<ContractEvent>> {
        self.machine.events()
    }

    pub fn offerer(&self) -> Option<String> {
        self.status().offer().map(|offer| offer.offerer.clone())
    }

    pub fn contract_url(&self) -> Option<String> {
        self.status().offer().map(|offer| offer.contract_url.clone())
    }

    pub fn signature_dropoff_url(&self) -> Option<String> {
        self.status()
            .offer()
            .and_then(|offer| offer.signature_dropoff_url.clone())
    }

    pub fn jlinx_host(&self) -> Option<String> {
        self.status().offer().map(|offer| offer.jlinx_host.clone())
    }

    pub fn signature_id(&self) -> Option<LedgerId> {
        self.status().signature_id().cloned()
    }

    pub fn signer(&self) -> Option<String> {
        self.status().signer().map(str::to_string)
    }

    pub async fn update(&self) -> Result<()> {
        self.machine.update().await
    }

    pub async fn wait_for_update(&self) -> Result<()> {
        self.machine.wait_for_update().await
    }

    /// Write the offer. Allowed once, on a contract with no events.
    pub async fn offer_contract(&self, options: OfferOptions) -> Result<()> {
        if options.offerer.is_empty() {
            return Err(ContractError::MissingField("offerer").into());
        }
        if options.contract_url.is_empty() {
            return Err(ContractError::MissingField("contractUrl").into());
        }

        self.machine.update().await?;
        if self.machine.length() > 1 {
            return Err(ContractError::AlreadyOffered.into());
        }

        self.machine
            .append(&ContractEvent::Offered {
                offerer: options.offerer,
                contract_url: options.contract_url,
                signature_dropoff_url: options.signature_dropoff_url,
                jlinx_host: self.client.host_url().to_string(),
            })
            .await?;
        info!(contract = %self.id().short_id(), "Contract offered");
        Ok(())
    }

    /// Answer this contract with a signature from a new party ledger.
    pub async fn sign(&self, identifier: &str) -> Result<ContractParty> {
        let party = ContractParty::create(self.client.clone()).await?;
        party.sign(identifier, self).await?;
        Ok(party)
    }

    /// Answer this contract with a rejection from a new party ledger.
    pub async fn reject(&self, identifier: &str) -> Result<ContractParty> {
        let party = ContractParty::create(self.client.clone()).await?;
        party.reject(identifier, self).await?;
        Ok(party)
    }

    /// Accept the party ledger `contract_response_id` as the response.
    ///
    /// The response must be an existing contract party that is unresolved
    /// or has resolved against this contract.
    pub async fn ack_signer_response(&self, contract_response_id: &LedgerId) -> Result<()> {
        self.machine.update().await?;
        if !matches!(self.status(), ContractStatus::Offered(_)) {
            return Err(ContractError::CannotAcknowledge.into());
        }
        self.check_response(contract_response_id).await?;

        self.machine
            .append(&ContractEvent::SignerResponded {
                contract_response_id: contract_response_id.clone(),
            })
            .await?;
        info!(
            contract = %self.id().short_id(),
            response = %contract_response_id.short_id(),
            status = self.status().name(),
            "Acknowledged signer response"
        );
        Ok(())
    }

    async fn check_response(&self, response_id: &LedgerId) -> Result<()> {
        if response_id == self.id() {
            return Err(ContractError::OwnResponse(self.id().to_string()).into());
        }

        let party = match self.client.contracts().get_party(response_id).await {
            Ok(party) => party,
            Err(ClientError::Ledger(LedgerError::NotFound(_))) => {
                return Err(ContractError::UnknownResponse(response_id.to_string()).into());
            }
            Err(e) => return Err(e),
        };

        let header = party.machine().header_record();
        let doc_type = header
            .as_ref()
            .and_then(|header| header.get(DOC_TYPE_FIELD))
            .and_then(Value::as_str);
        if doc_type != Some(PartyEvent::DOC_TYPE) {
            return Err(ClientError::Protocol(format!(
                "ledger {} is not a {} document",
                response_id,
                PartyEvent::DOC_TYPE
            )));
        }

        match party.contract_id() {
            Some(answered) if &answered != self.id() => Err(ContractError::ForeignResponse {
                response: response_id.to_string(),
                contract: answered.to_string(),
            }
            .into()),
            _ => Ok(()),
        }
    }

    pub fn to_json(&self) -> Result<Value> {
        self.machine.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(name: &str) -> LedgerId {
        LedgerId::from_content(name.as_bytes())
    }

    fn offered() -> ContractEvent {
        ContractEvent::Offered {
            offerer: "did:key:z6mkoffer".into(),
            contract_url: "https://contracts.example/nda".into(),
            signature_dropoff_url: None,
            jlinx_host: "https://host.example".into(),
        }
    }

    fn replay(events: &[ContractEvent]) -> ContractState {
        let mut state = ContractEvent::initial_state(&id("contract"));
        for event in events {
            if event.validate(&state).is_none() {
                state = event.apply(state);
            }
        }
        state
    }

    #[test]
    fn test_record_shape() {
        assert_eq!(
            serde_json::to_value(offered()).unwrap(),
            json!({
                "event": "offered",
                "offerer": "did:key:z6mkoffer",
                "contractUrl": "https://contracts.example/nda",
                "jlinxHost": "https://host.example"
            })
        );
    }

    #[test]
    fn test_offer_once() {
        let state = replay(&[offered()]);
        assert_eq!(offered().validate(&state).as_deref(), Some("already offered"));
    }

    #[test]
    fn test_acknowledge_requires_offer() {
        let ack = ContractEvent::SignerResponded {
            contract_response_id: id("party"),
        };
        let initial = ContractEvent::initial_state(&id("contract"));
        assert_eq!(
            ack.validate(&initial).as_deref(),
            Some("cannot acknowledge response, contract.state !== 'offered'")
        );
        assert_eq!(ack.add_stream(&initial), Some(id("party")));
    }

    #[test]
    fn test_signed_through_response() {
        let state = replay(&[
            offered(),
            ContractEvent::SignerResponded {
                contract_response_id: id("party"),
            },
            ContractEvent::Signed {
                signer: "did:key:z6mksigner".into(),
                contract_id: id("contract"),
            },
        ]);
        assert_eq!(state.status.name(), "signed");
        assert_eq!(state.status.signer(), Some("did:key:z6mksigner"));
        assert_eq!(state.status.signature_id(), Some(&id("party")));
    }

    #[test]
    fn test_response_for_other_contract_is_ignored() {
        let state = replay(&[
            offered(),
            ContractEvent::SignerResponded {
                contract_response_id: id("party"),
            },
            ContractEvent::Rejected {
                signer: "did:key:z6mksigner".into(),
                contract_id: id("elsewhere"),
            },
        ]);
        assert_eq!(state.status.name(), "signed");
        assert_eq!(state.status.signer(), None);
    }

    #[test]
    fn test_rejection() {
        let state = replay(&[
            offered(),
            ContractEvent::SignerResponded {
                contract_response_id: id("party"),
            },
            ContractEvent::Rejected {
                signer: "did:key:z6mksigner".into(),
                contract_id: id("contract"),
            },
        ]);
        assert_eq!(state.status.name(), "rejected");
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["state"], "rejected");
        assert_eq!(value["contractUrl"], "https://contracts.example/nda");
        assert_eq!(value["signer"], "did:key:z6mksigner");
        assert_eq!(value["contractId"], json!(id("contract")));
    }

    #[test]
    fn test_resolutions_only_from_spliced_streams() {
        let signed = ContractEvent::Signed {
            signer: "s".into(),
            contract_id: id("contract"),
        };
        assert_eq!(signed.origin(), EventOrigin::Spliced);
        assert_eq!(offered().origin(), EventOrigin::Any);
    }

    #[test]
    fn test_registry_covers_every_kind() {
        let registry = ContractEvent::registry().unwrap();
        assert_eq!(
            registry.kinds().collect::<Vec<_>>(),
            vec!["offered", "rejected", "signed", "signerResponded"]
        );
    }
}
