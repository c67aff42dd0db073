//! Interpreter behavior through the public API, converter included

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use steemx::interpret::fallback;
use steemx::operation::KNOWN_OPERATIONS;
use steemx::{FixedRate, Interpreter, Markup, RawOperation, VestsConverter};

/// Counts calls and fails every one of them
#[derive(Default)]
struct BrokenConverter {
    calls: AtomicUsize,
}

#[async_trait]
impl VestsConverter for BrokenConverter {
    async fn vests_to_sp(&self, _vests: f64) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("rate service unavailable"))
    }
}

/// Answers slower for smaller amounts
struct SlowConverter;

#[async_trait]
impl VestsConverter for SlowConverter {
    async fn vests_to_sp(&self, vests: f64) -> Result<f64> {
        tokio::time::sleep(Duration::from_millis((10_000.0 / vests) as u64)).await;
        Ok(vests)
    }
}

fn op(value: serde_json::Value) -> RawOperation {
    serde_json::from_value(value).unwrap()
}

fn plain() -> Interpreter<FixedRate> {
    Interpreter::new(FixedRate { steem_per_mvests: 500.0 }, Markup::Plain)
}

#[tokio::test]
async fn every_known_type_is_recognized() {
    let interpreter = plain();
    for name in KNOWN_OPERATIONS {
        let line = interpreter.interpret(&RawOperation::new(*name, json!({}))).await;
        assert!(
            !line.starts_with("Unrecognized operation"),
            "{name} should be recognized, got {line:?}"
        );
    }
}

#[tokio::test]
async fn unknown_type_yields_exact_message() {
    let line = plain()
        .interpret(&op(json!(["pow2", {"work": []}])))
        .await;
    assert_eq!(line, "Unrecognized operation: pow2");
}

#[tokio::test]
async fn missing_fields_yield_fallback() {
    let line = plain().interpret(&op(json!(["vote", {"voter": "alice"}]))).await;
    assert_eq!(line, fallback("vote"));
    assert_eq!(line, "Error formatting vote operation");
}

#[tokio::test]
async fn operation_suffix_and_object_form_are_accepted() {
    let line = plain()
        .interpret(&op(json!({
            "type": "transfer_operation",
            "value": {"from": "alice", "to": "bob", "amount": "5.000 STEEM", "memo": "hi"}
        })))
        .await;
    assert_eq!(line, "@alice transferred 5.000 STEEM to @bob");
}

#[tokio::test]
async fn vote_weight_picks_the_verb() {
    let interpreter = plain();
    let vote = |weight: i64| {
        op(json!(["vote", {"voter": "v", "author": "a", "permlink": "p", "weight": weight}]))
    };

    assert_eq!(interpreter.interpret(&vote(10000)).await, "@v upvoted @a/p");
    assert_eq!(interpreter.interpret(&vote(-500)).await, "@v downvoted @a/p");
    assert_eq!(interpreter.interpret(&vote(0)).await, "@v removed vote on @a/p");
}

#[tokio::test]
async fn claim_with_nothing_claimed() {
    let line = plain()
        .interpret(&op(json!(["claim_reward_balance", {
            "account": "a",
            "reward_steem": "0.000 STEEM",
            "reward_sbd": "0.000 SBD",
            "reward_vests": "0.000000 VESTS"
        }])))
        .await;
    assert_eq!(line, "@a claimed rewards");
}

#[tokio::test]
async fn vests_are_converted_to_sp() {
    let line = plain()
        .interpret(&op(json!(["producer_reward", {
            "producer": "w",
            "vesting_shares": "2000000.000000 VESTS"
        }])))
        .await;
    assert_eq!(line, "@w produced block and received 1000.000 SP as producer reward");
}

#[tokio::test]
async fn nai_amounts_are_understood() {
    let line = plain()
        .interpret(&op(json!(["transfer", {
            "from": "alice",
            "to": "bob",
            "amount": {"amount": "1500", "precision": 3, "nai": "@@000000021"}
        }])))
        .await;
    assert_eq!(line, "@alice transferred 1.500 STEEM to @bob");
}

#[tokio::test]
async fn failed_conversion_keeps_raw_vests_value() {
    let converter = Arc::new(BrokenConverter::default());
    let interpreter = Interpreter::new(converter.clone(), Markup::Plain);

    let line = interpreter
        .interpret(&op(json!(["curation_reward", {
            "curator": "c",
            "reward": "12.345678 VESTS",
            "comment_author": "a",
            "comment_permlink": "p"
        }])))
        .await;
    assert_eq!(
        line,
        "@c received 12.346 SP as curation reward for voting on @a/p"
    );
    assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_vests_skip_the_converter() {
    let converter = Arc::new(BrokenConverter::default());
    let interpreter = Interpreter::new(converter.clone(), Markup::Plain);

    let line = interpreter
        .interpret(&op(json!(["claim_reward_balance", {
            "account": "a",
            "reward_steem": "1.000 STEEM",
            "reward_sbd": "0.000 SBD",
            "reward_vests": "0.000000 VESTS"
        }])))
        .await;
    assert_eq!(line, "@a claimed 1.000 STEEM");
    assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn batch_output_keeps_input_order() {
    let interpreter = Interpreter::new(SlowConverter, Markup::Plain);
    let ops: Vec<RawOperation> = [10.0, 100.0, 1000.0]
        .iter()
        .map(|v| {
            op(json!(["producer_reward", {
                "producer": "w",
                "vesting_shares": format!("{v:.6} VESTS")
            }]))
        })
        .collect();

    let lines = interpreter.interpret_all(&ops, 3).await;
    assert_eq!(
        lines,
        vec![
            "@w produced block and received 10.000 SP as producer reward",
            "@w produced block and received 100.000 SP as producer reward",
            "@w produced block and received 1000.000 SP as producer reward",
        ]
    );
}

#[tokio::test]
async fn html_markup_links_accounts_and_posts() {
    let interpreter = Interpreter::new(FixedRate { steem_per_mvests: 500.0 }, Markup::Html);
    let line = interpreter
        .interpret(&op(json!([
            "vote",
            {"voter": "v", "author": "a", "permlink": "p", "weight": 1}
        ])))
        .await;
    assert_eq!(
        line,
        r#"<a href="/account/v">@v</a> upvoted <a href="/post/a/p">@a/p</a>"#
    );
}

/// One valid payload per known type, plus the branches that pick a different wording
fn sentence_cases() -> Vec<(&'static str, serde_json::Value, &'static str)> {
    let vests = "2000000.000000 VESTS";
    vec![
        (
            "transfer",
            json!({"from": "alice", "to": "bob", "amount": "5.000 STEEM"}),
            "@alice transferred 5.000 STEEM to @bob",
        ),
        (
            "transfer_to_vesting",
            json!({"from": "alice", "to": "bob", "amount": "1.000 STEEM"}),
            "@alice powered up 1.000 STEEM to @bob",
        ),
        (
            "withdraw_vesting",
            json!({"account": "alice", "vesting_shares": "1000.000000 VESTS"}),
            "@alice started power down of 1000.000000 VESTS",
        ),
        (
            "comment",
            json!({"parent_author": "", "author": "a", "permlink": "p", "title": "Hello"}),
            "@a created post Hello",
        ),
        (
            "vote",
            json!({"voter": "v", "author": "a", "permlink": "p", "weight": 100}),
            "@v upvoted @a/p",
        ),
        (
            "claim_reward_balance",
            json!({
                "account": "a",
                "reward_steem": "1.000 STEEM",
                "reward_sbd": "0.000 SBD",
                "reward_vests": vests
            }),
            "@a claimed 1.000 STEEM and 1000.000 SP",
        ),
        (
            "claim_account",
            json!({"creator": "c"}),
            "@c claimed account creation ticket",
        ),
        (
            "create_claimed_account",
            json!({"creator": "c", "new_account_name": "n"}),
            "@c created account @n",
        ),
        (
            "account_update",
            json!({"account": "a"}),
            "@a updated their account",
        ),
        (
            "account_witness_vote",
            json!({"account": "a", "witness": "w", "approve": true}),
            "@a voted for witness @w",
        ),
        (
            "account_witness_vote",
            json!({"account": "a", "witness": "w", "approve": false}),
            "@a removed vote from witness @w",
        ),
        (
            "account_witness_proxy",
            json!({"account": "a", "proxy": "b"}),
            "@a set witness proxy to @b",
        ),
        (
            "custom_json",
            json!({"required_posting_auths": ["p"], "id": "follow"}),
            "@p executed custom JSON operation (follow)",
        ),
        (
            "feed_publish",
            json!({
                "publisher": "w",
                "exchange_rate": {"base": "0.250 SBD", "quote": "1.000 STEEM"}
            }),
            "@w published feed with exchange rate 0.250 SBD / 1.000 STEEM",
        ),
        (
            "limit_order_create",
            json!({"owner": "o", "amount_to_sell": "10.000 STEEM", "min_to_receive": "2.500 SBD"}),
            "@o created limit order to sell 10.000 STEEM for 2.500 SBD",
        ),
        (
            "limit_order_cancel",
            json!({"owner": "o", "orderid": 42}),
            "@o cancelled limit order #42",
        ),
        (
            "delegate_vesting_shares",
            json!({"delegator": "d", "delegatee": "e", "vesting_shares": "500.000000 VESTS"}),
            "@d delegated 500.000000 VESTS to @e",
        ),
        (
            "delegate_vesting_shares",
            json!({"delegator": "d", "delegatee": "e", "vesting_shares": "0.000000 VESTS"}),
            "@d removed delegation of 0.000000 VESTS to @e",
        ),
        (
            "escrow_transfer",
            json!({"from": "f", "to": "t", "agent": "g"}),
            "@f started escrow transfer to @t with agent @g",
        ),
        (
            "escrow_approve",
            json!({"who": "g", "from": "f"}),
            "@g approved escrow transfer from @f",
        ),
        (
            "escrow_dispute",
            json!({"who": "t", "from": "f"}),
            "@t disputed escrow transfer from @f",
        ),
        (
            "escrow_release",
            json!({"who": "g", "receiver": "t"}),
            "@g released escrow transfer to @t",
        ),
        (
            "proposal_create",
            json!({"creator": "c", "subject": "Fund dev"}),
            "@c created proposal with subject: Fund dev",
        ),
        (
            "proposal_update",
            json!({"creator": "c", "subject": "Fund dev"}),
            "@c updated proposal with subject: Fund dev",
        ),
        (
            "proposal_vote",
            json!({"voter": "v", "approve": true, "proposal": {"creator": "c"}}),
            "@v approved proposal by @c",
        ),
        (
            "proposal_vote",
            json!({"voter": "v", "approve": false, "proposal": {"creator": "c"}}),
            "@v rejected proposal by @c",
        ),
        (
            "witness_update",
            json!({"owner": "w"}),
            "@w updated witness with block signing key",
        ),
        (
            "producer_reward",
            json!({"producer": "w", "vesting_shares": vests}),
            "@w produced block and received 1000.000 SP as producer reward",
        ),
        (
            "curation_reward",
            json!({
                "curator": "c",
                "reward": "4000000.000000 VESTS",
                "comment_author": "a",
                "comment_permlink": "p"
            }),
            "@c received 2000.000 SP as curation reward for voting on @a/p",
        ),
        (
            "author_reward",
            json!({
                "author": "a",
                "permlink": "p",
                "steem_payout": "0.000 STEEM",
                "sbd_payout": "1.500 SBD",
                "vesting_payout": vests
            }),
            "@a received 1.500 SBD and 1000.000 SP as author reward for @a/p",
        ),
        (
            "comment_reward",
            json!({"author": "a", "permlink": "p", "payout": "3.000 SBD"}),
            "@a received 3.000 SBD as comment reward for @a/p",
        ),
        (
            "interest",
            json!({"owner": "o", "interest": "0.010 SBD"}),
            "@o received 0.010 SBD as interest payment",
        ),
        (
            "fill_vesting_withdraw",
            json!({"from_account": "f", "withdrawn": "100.000000 VESTS"}),
            "@f withdrew 100.000000 VESTS from vesting",
        ),
        (
            "fill_order",
            json!({"current_owner": "o", "current_pays": "1.000 SBD", "open_pays": "4.000 STEEM"}),
            "@o had limit order filled: 1.000 SBD for 4.000 STEEM",
        ),
        (
            "effective_comment_vote",
            json!({"voter": "v", "author": "a", "permlink": "p", "weight": 5}),
            "@v's upvote was applied to @a/p",
        ),
        (
            "effective_comment_vote",
            json!({"voter": "v", "author": "a", "permlink": "p", "weight": -5}),
            "@v's downvote was applied to @a/p",
        ),
        (
            "effective_comment_vote",
            json!({"voter": "v", "author": "a", "permlink": "p", "weight": 0}),
            "@v's vote was applied to @a/p",
        ),
        (
            "ineffective_delete_comment",
            json!({"author": "a", "permlink": "p"}),
            "@a's comment deletion attempt failed for @a/p",
        ),
        (
            "liquidity_reward",
            json!({"owner": "o", "payout": "1.000 STEEM"}),
            "@o received 1.000 STEEM as liquidity reward",
        ),
        (
            "fill_convert_request",
            json!({"owner": "o", "amount_in": "1.000 SBD", "amount_out": "4.000 STEEM"}),
            "@o converted 1.000 SBD to 4.000 STEEM",
        ),
        (
            "comment_benefactor_reward",
            json!({
                "benefactor": "b",
                "author": "a",
                "permlink": "p",
                "sbd_payout": "0.000 SBD",
                "steem_payout": "0.000 STEEM",
                "vesting_payout": vests
            }),
            "@b received 1000.000 SP as benefactor reward for @a/p",
        ),
        (
            "comment_benefactor_reward",
            json!({
                "benefactor": "b",
                "author": "a",
                "permlink": "p",
                "sbd_payout": "1.000 SBD",
                "steem_payout": "2.000 STEEM",
                "vesting_payout": vests
            }),
            "@b received 1.000 SBD, 2.000 STEEM and 1000.000 SP as benefactor reward for @a/p",
        ),
        (
            "comment_benefactor_reward",
            json!({
                "benefactor": "b",
                "author": "a",
                "permlink": "p",
                "sbd_payout": "0.000 SBD",
                "steem_payout": "0.000 STEEM",
                "vesting_payout": "0.000000 VESTS"
            }),
            "@b received reward as benefactor reward for @a/p",
        ),
        (
            "return_vesting_delegation",
            json!({"account": "a", "vesting_shares": "500.000000 VESTS"}),
            "@a had 500.000000 VESTS vesting delegation returned",
        ),
        (
            "update_proposal_votes",
            json!({"voter": "v", "proposal_ids": [3], "approve": true}),
            "@v voted for proposal #3",
        ),
    ]
}

#[tokio::test]
async fn every_known_type_has_its_sentence() {
    let interpreter = plain();
    let cases = sentence_cases();

    for name in KNOWN_OPERATIONS {
        assert!(
            cases.iter().any(|(t, _, _)| t == name),
            "no sentence case for {name}"
        );
    }

    for (op_type, payload, expected) in cases {
        let line = interpreter
            .interpret(&RawOperation::new(op_type, payload))
            .await;
        assert_eq!(line, expected, "sentence for {op_type}");
    }
}
