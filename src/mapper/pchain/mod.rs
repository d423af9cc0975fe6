//! P-chain transactions as Rosetta operations, in both directions.

pub mod balance;
pub mod builder;
pub mod dependency;
pub mod parser;
mod tx_ops;

use serde::Deserialize;
use serde::Serialize;
use strum::IntoEnumIterator;

use super::matcher::Match;
use crate::protocol::ids::Id;
use crate::rosetta::types::Metadata as RosettaMetadata;

pub use builder::build_tx;
pub use builder::BuildError;
pub use dependency::BlockTxDependencies;
pub use dependency::DependencyTx;
pub use parser::ParseError;
pub use parser::TxParser;
pub use parser::TxParserConfig;

// Transaction metadata keys.
pub const META_TX_TYPE: &str = "tx_type";
pub const META_IMPORTED_INPUTS: &str = "imported_inputs";
pub const META_EXPORTED_OUTPUTS: &str = "exported_outputs";

// Stake and reward operation metadata keys.
pub const META_VALIDATOR_NODE_ID: &str = "validator_node_id";
pub const META_STAKING_START_TIME: &str = "staking_start_time";
pub const META_STAKING_END_TIME: &str = "staking_end_time";
pub const META_SIGNER: &str = "signer";

// Balance metadata keys for the pending-rewards sub-account.
pub const META_VALIDATOR_REWARDS: &str = "validator_rewards";
pub const META_DELEGATION_REWARDS: &str = "delegation_rewards";
pub const META_DELEGATION_FEE_REWARDS: &str = "delegation_fee_rewards";

/// Rosetta operation type of a P-chain transaction.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    ImportAvax,
    ExportAvax,
    AddValidator,
    AddDelegator,
    RewardValidator,
    CreateChain,
    CreateSubnet,
    AddSubnetValidator,
    RemoveSubnetValidator,
    TransformSubnetValidator,
    AddPermissionlessValidator,
    AddPermissionlessDelegator,
    AdvanceTime,
}

impl TxType {
    /// Types a client can construct or observe as operations.
    pub fn operation_types() -> Vec<String> {
        Self::iter()
            .filter(|t| *t != Self::AdvanceTime)
            .map(|t| t.to_string())
            .collect()
    }

    pub fn is_staking(self) -> bool {
        matches!(
            self,
            Self::AddValidator
                | Self::AddDelegator
                | Self::AddPermissionlessValidator
                | Self::AddPermissionlessDelegator
        )
    }
}

/// Role of an operation within its transaction, carried as `metadata.type`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpKind {
    Input,
    Output,
    Import,
    Export,
    Stake,
    Reward,
}

impl OpKind {
    /// Inputs and imports debit their account.
    pub fn is_debit(self) -> bool {
        matches!(self, Self::Input | Self::Import)
    }
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// Per-operation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationMetadata {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<OpKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig_indices: Option<Vec<u32>>,
    #[serde(default)]
    pub locktime: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub threshold: u32,
}

impl OperationMetadata {
    /// Reads construction metadata, defaulting to a single signer and a
    /// threshold of one.
    pub fn parse(metadata: Option<&RosettaMetadata>) -> Result<Self, serde_json::Error> {
        let mut parsed: Self = match metadata {
            Some(metadata) => super::from_metadata(metadata)?,
            None => Self::default(),
        };
        if parsed.threshold == 0 {
            parsed.threshold = 1;
        }
        if parsed.sig_indices.is_none() {
            parsed.sig_indices = Some(vec![0]);
        }
        Ok(parsed)
    }

    pub fn sig_indices(&self) -> Vec<u32> {
        self.sig_indices.clone().unwrap_or_else(|| vec![0])
    }
}

/// Options produced by `/construction/preprocess` and read back by
/// `/construction/metadata`: the caller's request metadata plus the
/// transaction type and the matched operations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConstructionOptions {
    #[serde(rename = "type", default)]
    pub tx_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<Match>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_chain: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_chain: String,
    #[serde(flatten)]
    pub staking: StakingOptions,
}

/// Staking parameters a client supplies at preprocess time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StakingOptions {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bls_public_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bls_proof_of_possession: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_rewards_owners: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delegation_rewards_owners: Vec<String>,
    #[serde(default)]
    pub start: u64,
    #[serde(default)]
    pub end: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnet: String,
    #[serde(default)]
    pub shares: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memo: String,
    #[serde(default)]
    pub locktime: u64,
    #[serde(default)]
    pub threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMetadata {
    pub source_chain_id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub destination_chain: String,
    pub destination_chain_id: Id,
}

/// Staking parameters as handed to the builder. Identical in shape to the
/// options, with `node_id` required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingMetadata {
    pub node_id: String,
    #[serde(default)]
    pub bls_public_key: String,
    #[serde(default)]
    pub bls_proof_of_possession: String,
    #[serde(default)]
    pub validation_rewards_owners: Vec<String>,
    #[serde(default)]
    pub delegation_rewards_owners: Vec<String>,
    #[serde(default)]
    pub start: u64,
    #[serde(default)]
    pub end: u64,
    #[serde(default)]
    pub subnet: String,
    #[serde(default)]
    pub shares: u32,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub locktime: u64,
    #[serde(default)]
    pub threshold: u32,
}

impl From<StakingOptions> for StakingMetadata {
    fn from(options: StakingOptions) -> Self {
        Self {
            node_id: options.node_id,
            bls_public_key: options.bls_public_key,
            bls_proof_of_possession: options.bls_proof_of_possession,
            validation_rewards_owners: options.validation_rewards_owners,
            delegation_rewards_owners: options.delegation_rewards_owners,
            start: options.start,
            end: options.end,
            subnet: options.subnet,
            shares: options.shares,
            memo: options.memo,
            locktime: options.locktime,
            threshold: options.threshold,
        }
    }
}

/// Output of `/construction/metadata`, input of `/construction/payloads`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConstructionMetadata {
    pub network_id: u32,
    pub blockchain_id: Id,
    #[serde(flatten)]
    pub import: Option<ImportMetadata>,
    #[serde(flatten)]
    pub export: Option<ExportMetadata>,
    #[serde(flatten)]
    pub staking: Option<StakingMetadata>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;
    use serde_json::json;

    use super::*;
    use crate::mapper::from_metadata;
    use crate::mapper::to_metadata;

    #[test]
    fn tx_type_text_forms() {
        assert!(TxType::ImportAvax.to_string() == "IMPORT_AVAX");
        assert!(TxType::TransformSubnetValidator.to_string() == "TRANSFORM_SUBNET_VALIDATOR");
        assert!("ADD_PERMISSIONLESS_DELEGATOR".parse::<TxType>().unwrap() == TxType::AddPermissionlessDelegator);
        assert!(!TxType::operation_types().contains(&"ADVANCE_TIME".to_owned()));
        assert!(TxType::operation_types().len() == 12);
    }

    #[test]
    fn operation_metadata_defaults() {
        let parsed = OperationMetadata::parse(None).unwrap();
        assert!(parsed.threshold == 1);
        assert!(parsed.sig_indices == Some(vec![0]));
        assert!(parsed.kind.is_none());

        let map = to_metadata(&json!({"type": "STAKE", "threshold": 2})).unwrap();
        let parsed = OperationMetadata::parse(Some(&map)).unwrap();
        assert!(parsed.kind == Some(OpKind::Stake));
        assert!(parsed.threshold == 2);
    }

    #[test]
    fn input_metadata_omits_threshold() {
        let metadata = OperationMetadata {
            kind: Some(OpKind::Input),
            sig_indices: Some(vec![0, 1]),
            locktime: 0,
            threshold: 0,
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert!(value == json!({"type": "INPUT", "sig_indices": [0, 1], "locktime": 0}));
    }

    #[test]
    fn construction_metadata_flattens_sections() {
        let metadata = ConstructionMetadata {
            network_id: 5,
            blockchain_id: Id::EMPTY,
            import: None,
            export: Some(ExportMetadata {
                destination_chain: "C".into(),
                destination_chain_id: Id([1; 32]),
            }),
            staking: None,
        };
        let map = to_metadata(&metadata).unwrap();
        assert!(map["destination_chain"] == "C");
        assert!(!map.contains_key("node_id"));
        let back: ConstructionMetadata = from_metadata(&map).unwrap();
        assert!(back == metadata);
    }

    #[test]
    fn options_keep_staking_fields_at_top_level() {
        let options: ConstructionOptions = serde_json::from_value(json!({
            "type": "ADD_DELEGATOR",
            "node_id": "NodeID-abc",
            "start": 10,
            "end": 20,
            "validation_rewards_owners": ["P-fuji1xyz"],
        }))
        .unwrap();
        assert!(options.tx_type == "ADD_DELEGATOR");
        assert!(options.staking.node_id == "NodeID-abc");
        assert!(options.staking.end == 20);
        assert!(options.matches.is_none());
    }
}
