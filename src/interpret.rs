//! Human-readable descriptions of blockchain operations.
//!
//! Interpretation happens in two steps:
//! 1. `Interpreter::interpret` validates the payload and resolves every
//!    VESTS amount to SP through a [`VestsConverter`] (the only async part)
//! 2. [`describe`] writes the sentence, a pure function over the typed op
//!
//! The interpreter never fails: unknown types yield
//! `"Unrecognized operation: {type}"` and bad payloads a fallback line.

use crate::amount::{format_fixed3, Amount, SBD, SP, STEEM};
use crate::operation::{Operation, OperationError, RawOperation};
use crate::util_text::join_with_and;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use html_escape::encode_text;
use std::fmt;

/// VESTS → SP conversion, backed by a remote rate in production
#[async_trait]
pub trait VestsConverter: Send + Sync {
    async fn vests_to_sp(&self, vests: f64) -> Result<f64>;
}

#[async_trait]
impl<T: VestsConverter + ?Sized> VestsConverter for std::sync::Arc<T> {
    async fn vests_to_sp(&self, vests: f64) -> Result<f64> {
        (**self).vests_to_sp(vests).await
    }
}

/// Converter using a fixed `steem_per_mvests` rate (offline mode, tests)
#[derive(Clone, Copy, Debug)]
pub struct FixedRate {
    pub steem_per_mvests: f64,
}

#[async_trait]
impl VestsConverter for FixedRate {
    async fn vests_to_sp(&self, vests: f64) -> Result<f64> {
        Ok(vests * self.steem_per_mvests / 1_000_000.0)
    }
}

/// How account and post references are rendered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Markup {
    /// `@alice`, `@alice/permlink`
    #[default]
    Plain,
    /// `<a href="/account/alice">@alice</a>`
    Html,
}

impl std::str::FromStr for Markup {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plain" | "text" => Ok(Markup::Plain),
            "html" => Ok(Markup::Html),
            _ => Err(anyhow::anyhow!("Invalid markup '{s}'. Valid options: plain, html")),
        }
    }
}

impl Markup {
    fn account(self, name: &str) -> String {
        match self {
            Markup::Plain => format!("@{name}"),
            Markup::Html => format!(
                r#"<a href="/account/{}">@{}</a>"#,
                urlencoding::encode(name),
                encode_text(name)
            ),
        }
    }

    fn post(self, author: &str, permlink: &str) -> String {
        match self {
            Markup::Plain => format!("@{author}/{permlink}"),
            Markup::Html => format!(
                r#"<a href="{}">@{}/{}</a>"#,
                post_href(author, permlink),
                encode_text(author),
                encode_text(permlink)
            ),
        }
    }

    fn post_titled(self, author: &str, permlink: &str, title: &str) -> String {
        match self {
            Markup::Plain => title.to_string(),
            Markup::Html => format!(
                r#"<a href="{}">{}</a>"#,
                post_href(author, permlink),
                encode_text(title)
            ),
        }
    }

    /// Free text from the chain (titles, subjects, ids, amounts)
    fn text(self, value: impl fmt::Display) -> String {
        let value = value.to_string();
        match self {
            Markup::Plain => value,
            Markup::Html => encode_text(&value).into_owned(),
        }
    }
}

fn post_href(author: &str, permlink: &str) -> String {
    format!(
        "/post/{}/{}",
        urlencoding::encode(author),
        urlencoding::encode(permlink)
    )
}

/// Line returned for payloads that fail validation
pub fn fallback(op_type: &str) -> String {
    format!("Error formatting {op_type} operation")
}

pub struct Interpreter<C> {
    converter: C,
    markup: Markup,
}

impl<C: VestsConverter> Interpreter<C> {
    pub fn new(converter: C, markup: Markup) -> Self {
        Self { converter, markup }
    }

    pub async fn interpret(&self, raw: &RawOperation) -> String {
        let op = match Operation::parse(raw) {
            Ok(op) => op,
            Err(e @ OperationError::Unrecognized(_)) => return e.to_string(),
            Err(e) => {
                log::warn!("[interpret] {e}");
                return fallback(&raw.op_type);
            }
        };

        let mut sp = Vec::new();
        for amount in op.vests_fields() {
            sp.push(self.to_sp(&amount).await);
        }
        describe(&op, &sp, self.markup)
    }

    /// Interpret a page of operations; output order matches input order
    /// even though conversions run concurrently.
    pub async fn interpret_all(&self, ops: &[RawOperation], concurrency: usize) -> Vec<String> {
        stream::iter(ops)
            .map(|op| self.interpret(op))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn to_sp(&self, amount: &Amount) -> f64 {
        if !amount.is_vests() || amount.is_zero() {
            return amount.value;
        }
        match self.converter.vests_to_sp(amount.value).await {
            Ok(sp) => sp,
            Err(e) => {
                log::warn!("[interpret] VESTS conversion failed, keeping raw value: {e:#}");
                amount.value
            }
        }
    }
}

/// Non-zero reward components, rendered with three decimals
fn reward_parts(components: &[(f64, &str)]) -> Vec<String> {
    components
        .iter()
        .filter(|(v, _)| *v != 0.0)
        .map(|(v, sym)| format_fixed3(*v, sym))
        .collect()
}

fn value_of(a: &Option<Amount>) -> f64 {
    a.as_ref().map(|a| a.value).unwrap_or(0.0)
}

/// Write the sentence for an operation. `sp` holds the converted values of
/// `op.vests_fields()`, in the same order.
pub fn describe(op: &Operation, sp: &[f64], m: Markup) -> String {
    let sp_at = |i: usize| sp.get(i).copied().unwrap_or_default();
    let acct = |name: &str| m.account(name);

    match op {
        Operation::Transfer(op) => format!(
            "{} transferred {} to {}",
            acct(&op.from),
            m.text(&op.amount),
            acct(&op.to)
        ),
        Operation::TransferToVesting(op) => {
            let recipient = if op.to.is_empty() { &op.from } else { &op.to };
            format!(
                "{} powered up {} to {}",
                acct(&op.from),
                m.text(&op.amount),
                acct(recipient)
            )
        }
        Operation::WithdrawVesting(op) => format!(
            "{} started power down of {}",
            acct(&op.account),
            m.text(&op.vesting_shares)
        ),
        Operation::Comment(op) => {
            if op.parent_author.is_empty() {
                let title = if op.title.is_empty() { &op.permlink } else { &op.title };
                format!(
                    "{} created post {}",
                    acct(&op.author),
                    m.post_titled(&op.author, &op.permlink, title)
                )
            } else {
                format!(
                    "{} replied to {}",
                    acct(&op.author),
                    m.post(&op.parent_author, &op.parent_permlink)
                )
            }
        }
        Operation::Vote(op) => {
            let verb = match op.weight {
                w if w > 0 => "upvoted",
                w if w < 0 => "downvoted",
                _ => "removed vote on",
            };
            format!(
                "{} {verb} {}",
                acct(&op.voter),
                m.post(&op.author, &op.permlink)
            )
        }
        Operation::ClaimRewardBalance(op) => {
            let parts = reward_parts(&[
                (value_of(&op.reward_steem), STEEM),
                (value_of(&op.reward_sbd), SBD),
                (sp_at(0), SP),
            ]);
            let rewards = if parts.is_empty() {
                "rewards".to_string()
            } else {
                join_with_and(&parts)
            };
            format!("{} claimed {rewards}", acct(&op.account))
        }
        Operation::ClaimAccount(op) => {
            format!("{} claimed account creation ticket", acct(&op.creator))
        }
        Operation::CreateClaimedAccount(op) => format!(
            "{} created account {}",
            acct(&op.creator),
            acct(&op.new_account_name)
        ),
        Operation::AccountUpdate(op) => format!("{} updated their account", acct(&op.account)),
        Operation::AccountWitnessVote(op) => {
            let action = if op.approve { "voted for" } else { "removed vote from" };
            format!(
                "{} {action} witness {}",
                acct(&op.account),
                acct(&op.witness)
            )
        }
        Operation::AccountWitnessProxy(op) => match op.target() {
            Some(proxy) => format!(
                "{} set witness proxy to {}",
                acct(&op.account),
                acct(proxy)
            ),
            None => format!("{} cleared witness proxy", acct(&op.account)),
        },
        Operation::CustomJson(op) => format!(
            "{} executed custom JSON operation ({})",
            acct(op.signer()),
            m.text(&op.id)
        ),
        Operation::FeedPublish(op) => {
            let rate = op.exchange_rate.clone().unwrap_or_default();
            let show = |a: &Option<Amount>| {
                a.as_ref()
                    .map(|a| m.text(a))
                    .unwrap_or_else(|| "N/A".to_string())
            };
            format!(
                "{} published feed with exchange rate {} / {}",
                acct(&op.publisher),
                show(&rate.base),
                show(&rate.quote)
            )
        }
        Operation::LimitOrderCreate(op) => format!(
            "{} created limit order to sell {} for {}",
            acct(&op.owner),
            m.text(&op.amount_to_sell),
            m.text(&op.min_to_receive)
        ),
        Operation::LimitOrderCancel(op) => format!(
            "{} cancelled limit order #{}",
            acct(&op.owner),
            op.orderid
        ),
        Operation::DelegateVestingShares(op) => {
            let action = if op.vesting_shares.value > 0.0 {
                "delegated"
            } else {
                "removed delegation of"
            };
            format!(
                "{} {action} {} to {}",
                acct(&op.delegator),
                m.text(&op.vesting_shares),
                acct(&op.delegatee)
            )
        }
        Operation::EscrowTransfer(op) => format!(
            "{} started escrow transfer to {} with agent {}",
            acct(&op.from),
            acct(&op.to),
            acct(&op.agent)
        ),
        Operation::EscrowApprove(op) => format!(
            "{} approved escrow transfer from {}",
            acct(&op.who),
            acct(&op.from)
        ),
        Operation::EscrowDispute(op) => format!(
            "{} disputed escrow transfer from {}",
            acct(&op.who),
            acct(&op.from)
        ),
        Operation::EscrowRelease(op) => format!(
            "{} released escrow transfer to {}",
            acct(&op.who),
            acct(&op.receiver)
        ),
        Operation::ProposalCreate(op) => format!(
            "{} created proposal with subject: {}",
            acct(&op.creator),
            m.text(&op.subject)
        ),
        Operation::ProposalUpdate(op) => format!(
            "{} updated proposal with subject: {}",
            acct(&op.creator),
            m.text(&op.subject)
        ),
        Operation::ProposalVote(op) => {
            let verdict = if op.approve { "approved" } else { "rejected" };
            format!(
                "{} {verdict} proposal by {}",
                acct(&op.voter),
                acct(&op.proposal.creator)
            )
        }
        Operation::WitnessUpdate(op) => format!(
            "{} updated witness with block signing key",
            acct(&op.owner)
        ),
        Operation::ProducerReward(op) => format!(
            "{} produced block and received {} as producer reward",
            acct(&op.producer),
            format_fixed3(sp_at(0), SP)
        ),
        Operation::CurationReward(op) => format!(
            "{} received {} as curation reward for voting on {}",
            acct(&op.curator),
            format_fixed3(sp_at(0), SP),
            m.post(&op.comment_author, &op.comment_permlink)
        ),
        Operation::AuthorReward(op) => {
            let parts = reward_parts(&[
                (value_of(&op.steem_payout), STEEM),
                (value_of(&op.sbd_payout), SBD),
                (sp_at(0), SP),
            ]);
            let reward = if parts.is_empty() {
                "reward".to_string()
            } else {
                join_with_and(&parts)
            };
            format!(
                "{} received {reward} as author reward for {}",
                acct(&op.author),
                m.post(&op.author, &op.permlink)
            )
        }
        Operation::CommentReward(op) => format!(
            "{} received {} as comment reward for {}",
            acct(&op.author),
            m.text(&op.payout),
            m.post(&op.author, &op.permlink)
        ),
        Operation::Interest(op) => format!(
            "{} received {} as interest payment",
            acct(&op.owner),
            m.text(&op.interest)
        ),
        Operation::FillVestingWithdraw(op) => format!(
            "{} withdrew {} from vesting",
            acct(&op.from_account),
            m.text(&op.withdrawn)
        ),
        Operation::FillOrder(op) => format!(
            "{} had limit order filled: {} for {}",
            acct(&op.current_owner),
            m.text(&op.current_pays),
            m.text(&op.open_pays)
        ),
        Operation::EffectiveCommentVote(op) => {
            let kind = match op.weight {
                w if w > 0 => "upvote",
                w if w < 0 => "downvote",
                _ => "vote",
            };
            format!(
                "{}'s {kind} was applied to {}",
                acct(&op.voter),
                m.post(&op.author, &op.permlink)
            )
        }
        Operation::IneffectiveDeleteComment(op) => format!(
            "{}'s comment deletion attempt failed for {}",
            acct(&op.author),
            m.post(&op.author, &op.permlink)
        ),
        Operation::LiquidityReward(op) => format!(
            "{} received {} as liquidity reward",
            acct(&op.owner),
            m.text(&op.payout)
        ),
        Operation::FillConvertRequest(op) => format!(
            "{} converted {} to {}",
            acct(&op.owner),
            m.text(&op.amount_in),
            m.text(&op.amount_out)
        ),
        Operation::CommentBenefactorReward(op) => {
            let parts = reward_parts(&[
                (value_of(&op.sbd_payout), SBD),
                (value_of(&op.steem_payout), STEEM),
                (sp_at(0), SP),
            ]);
            let reward = if parts.is_empty() {
                "reward".to_string()
            } else {
                join_with_and(&parts)
            };
            format!(
                "{} received {reward} as benefactor reward for {}",
                acct(&op.benefactor),
                m.post(&op.author, &op.permlink)
            )
        }
        Operation::ReturnVestingDelegation(op) => format!(
            "{} had {} vesting delegation returned",
            acct(&op.account),
            m.text(&op.vesting_shares)
        ),
        Operation::UpdateProposalVotes(op) => {
            let action = if op.approve { "voted for" } else { "voted against" };
            match op.proposal_ids.as_slice() {
                [] => format!("{} updated proposal votes", acct(&op.voter)),
                [id] => format!("{} {action} proposal #{id}", acct(&op.voter)),
                ids => {
                    let list = ids
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{} {action} proposals #{list}", acct(&op.voter))
                }
            }
        }
    }
}
