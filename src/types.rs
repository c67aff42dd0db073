use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Push message from the explorer WebSocket. Each frame carries either a
/// new block summary or a refresh of the network properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WsPayload {
    Block { block: BlockData },
    Props { props: NetworkProperties },
}

/// Block summary as pushed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockData {
    pub height: u64,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub op_count: u64,
    #[serde(default)]
    pub op_types: Vec<String>,
    /// UTC, usually without a zone suffix (`2024-05-01T12:00:00`)
    pub ts: String,
    #[serde(default)]
    pub op_counts: BTreeMap<String, u64>,
}

/// Dynamic global properties of the chain. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkProperties {
    pub head_block_number: u64,
    pub head_block_id: String,
    pub time: String,
    pub current_witness: String,
    pub virtual_supply: String,
    pub current_supply: String,
    pub current_sbd_supply: String,
    pub total_vesting_fund_steem: String,
    pub total_vesting_shares: String,
    pub sbd_interest_rate: u32,
    pub sbd_print_rate: u32,
    pub maximum_block_size: u64,
    pub participation_count: u64,
    pub last_irreversible_block_num: u64,
    pub available_account_subsidies: u64,
    pub content_reward_percent: u32,
    pub vesting_reward_percent: u32,
    pub sps_fund_percent: u32,
    pub downvote_pool_percent: u32,
    pub steem_per_mvests: f64,
    pub reversible_blocks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_and_props_frames_are_told_apart() {
        let block: WsPayload = serde_json::from_value(json!({
            "block": {"height": 7, "accounts": ["a"], "opCount": 2, "opTypes": ["vote"],
                      "ts": "2024-05-01T12:00:00", "opCounts": {"vote": 2}}
        }))
        .unwrap();
        match block {
            WsPayload::Block { block } => {
                assert_eq!(block.height, 7);
                assert_eq!(block.op_counts["vote"], 2);
            }
            other => panic!("Expected block frame, got {other:?}"),
        }

        let props: WsPayload = serde_json::from_value(json!({
            "props": {"head_block_number": 99, "steem_per_mvests": 512.5, "extra": true}
        }))
        .unwrap();
        match props {
            WsPayload::Props { props } => {
                assert_eq!(props.head_block_number, 99);
                assert_eq!(props.steem_per_mvests, 512.5);
            }
            other => panic!("Expected props frame, got {other:?}"),
        }
    }

    #[test]
    fn unrelated_frames_fail_to_parse() {
        assert!(serde_json::from_str::<WsPayload>(r#"{"hello":"world"}"#).is_err());
        assert!(serde_json::from_str::<WsPayload>("not json").is_err());
    }
}
