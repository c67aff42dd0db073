//! Typed blockchain operations.
//!
//! The APIs hand out operations as `[type, payload]` tuples (or
//! `{"type": .., "value": ..}` objects) with a payload whose shape depends on
//! the type. Payloads are decoded into one record per variant here so the
//! interpreter never pokes at loosely-typed JSON.

use crate::amount::{Amount, VESTS};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Unrecognized operation: {0}")]
    Unrecognized(String),
    #[error("malformed {op_type} payload: {source}")]
    Malformed {
        op_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// An operation as it arrives from the API, before validation
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(from = "RawRepr", into = "(String, Value)")]
pub struct RawOperation {
    pub op_type: String,
    pub payload: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRepr {
    Tuple(String, Value),
    Object {
        #[serde(rename = "type")]
        op_type: String,
        #[serde(default)]
        value: Value,
    },
}

impl From<RawRepr> for RawOperation {
    fn from(r: RawRepr) -> Self {
        match r {
            RawRepr::Tuple(op_type, payload) => RawOperation::new(op_type, payload),
            RawRepr::Object { op_type, value } => RawOperation::new(op_type, value),
        }
    }
}

impl From<RawOperation> for (String, Value) {
    fn from(r: RawOperation) -> Self {
        (r.op_type, r.payload)
    }
}

impl RawOperation {
    /// Normalizes `transfer_operation` style names to `transfer`
    pub fn new(op_type: impl Into<String>, payload: Value) -> Self {
        let mut op_type = op_type.into();
        if let Some(stripped) = op_type.strip_suffix("_operation") {
            op_type = stripped.to_string();
        }
        Self { op_type, payload }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        Amount::from_value(&v).map_err(serde::de::Error::custom)
    }
}

// ----- per-variant records -----

#[derive(Clone, Debug, Deserialize)]
pub struct Transfer {
    pub from: String,
    pub to: String,
    pub amount: Amount,
    #[serde(default)]
    pub memo: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TransferToVesting {
    pub from: String,
    #[serde(default)]
    pub to: String,
    pub amount: Amount,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WithdrawVesting {
    pub account: String,
    pub vesting_shares: Amount,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub parent_author: String,
    #[serde(default)]
    pub parent_permlink: String,
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Vote {
    pub voter: String,
    pub author: String,
    pub permlink: String,
    pub weight: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClaimRewardBalance {
    pub account: String,
    #[serde(default)]
    pub reward_steem: Option<Amount>,
    #[serde(default)]
    pub reward_sbd: Option<Amount>,
    #[serde(default)]
    pub reward_vests: Option<Amount>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClaimAccount {
    pub creator: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateClaimedAccount {
    pub creator: String,
    pub new_account_name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AccountUpdate {
    pub account: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AccountWitnessVote {
    pub account: String,
    pub witness: String,
    #[serde(default)]
    pub approve: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AccountWitnessProxy {
    pub account: String,
    #[serde(default)]
    pub proxy: Option<String>,
}

impl AccountWitnessProxy {
    /// Proxy being set, `None` when the op clears it
    pub fn target(&self) -> Option<&str> {
        self.proxy.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CustomJson {
    #[serde(default)]
    pub required_auths: Vec<String>,
    #[serde(default)]
    pub required_posting_auths: Vec<String>,
    pub id: String,
}

impl CustomJson {
    pub fn signer(&self) -> &str {
        self.required_auths
            .first()
            .or_else(|| self.required_posting_auths.first())
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ExchangeRate {
    #[serde(default)]
    pub base: Option<Amount>,
    #[serde(default)]
    pub quote: Option<Amount>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FeedPublish {
    pub publisher: String,
    #[serde(default)]
    pub exchange_rate: Option<ExchangeRate>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LimitOrderCreate {
    pub owner: String,
    pub amount_to_sell: Amount,
    pub min_to_receive: Amount,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LimitOrderCancel {
    pub owner: String,
    pub orderid: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DelegateVestingShares {
    pub delegator: String,
    pub delegatee: String,
    pub vesting_shares: Amount,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EscrowTransfer {
    pub from: String,
    pub to: String,
    pub agent: String,
}

/// Shared shape of escrow_approve and escrow_dispute
#[derive(Clone, Debug, Deserialize)]
pub struct EscrowAction {
    pub who: String,
    pub from: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EscrowRelease {
    pub who: String,
    pub receiver: String,
}

/// Shared shape of proposal_create and proposal_update
#[derive(Clone, Debug, Deserialize)]
pub struct ProposalChange {
    pub creator: String,
    pub subject: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProposalRef {
    pub creator: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProposalVote {
    pub voter: String,
    #[serde(default)]
    pub approve: bool,
    pub proposal: ProposalRef,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WitnessUpdate {
    pub owner: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProducerReward {
    pub producer: String,
    pub vesting_shares: Amount,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CurationReward {
    pub curator: String,
    pub reward: Amount,
    pub comment_author: String,
    pub comment_permlink: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuthorReward {
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub steem_payout: Option<Amount>,
    #[serde(default)]
    pub sbd_payout: Option<Amount>,
    #[serde(default)]
    pub vesting_payout: Option<Amount>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CommentReward {
    pub author: String,
    pub permlink: String,
    pub payout: Amount,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Interest {
    pub owner: String,
    pub interest: Amount,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FillVestingWithdraw {
    pub from_account: String,
    pub withdrawn: Amount,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FillOrder {
    pub current_owner: String,
    pub current_pays: Amount,
    pub open_pays: Amount,
}

/// Shared shape of the post-scoped virtual ops that only name the post
#[derive(Clone, Debug, Deserialize)]
pub struct PostRef {
    pub author: String,
    pub permlink: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EffectiveCommentVote {
    pub voter: String,
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub weight: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LiquidityReward {
    pub owner: String,
    pub payout: Amount,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FillConvertRequest {
    pub owner: String,
    pub amount_in: Amount,
    pub amount_out: Amount,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CommentBenefactorReward {
    pub benefactor: String,
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub sbd_payout: Option<Amount>,
    #[serde(default)]
    pub steem_payout: Option<Amount>,
    #[serde(default)]
    pub vesting_payout: Option<Amount>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReturnVestingDelegation {
    pub account: String,
    pub vesting_shares: Amount,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateProposalVotes {
    pub voter: String,
    #[serde(default)]
    pub proposal_ids: Vec<u64>,
    #[serde(default)]
    pub approve: bool,
}

macro_rules! operations {
    ($( $name:literal => $variant:ident($rec:ty) ),* $(,)?) => {
        /// A validated operation, one variant per known type
        #[derive(Clone, Debug)]
        pub enum Operation {
            $( $variant($rec), )*
        }

        /// Every operation type name the interpreter understands
        pub const KNOWN_OPERATIONS: &[&str] = &[ $( $name, )* ];

        impl Operation {
            pub fn name(&self) -> &'static str {
                match self {
                    $( Operation::$variant(_) => $name, )*
                }
            }

            fn decode(op_type: &str, payload: &Value) -> Result<Self, OperationError> {
                let malformed = |source| OperationError::Malformed {
                    op_type: op_type.to_string(),
                    source,
                };
                match op_type {
                    $( $name => <$rec>::deserialize(payload)
                        .map(Operation::$variant)
                        .map_err(malformed), )*
                    other => Err(OperationError::Unrecognized(other.to_string())),
                }
            }
        }
    };
}

operations! {
    "transfer" => Transfer(Transfer),
    "transfer_to_vesting" => TransferToVesting(TransferToVesting),
    "withdraw_vesting" => WithdrawVesting(WithdrawVesting),
    "comment" => Comment(Comment),
    "vote" => Vote(Vote),
    "claim_reward_balance" => ClaimRewardBalance(ClaimRewardBalance),
    "claim_account" => ClaimAccount(ClaimAccount),
    "create_claimed_account" => CreateClaimedAccount(CreateClaimedAccount),
    "account_update" => AccountUpdate(AccountUpdate),
    "account_witness_vote" => AccountWitnessVote(AccountWitnessVote),
    "account_witness_proxy" => AccountWitnessProxy(AccountWitnessProxy),
    "custom_json" => CustomJson(CustomJson),
    "feed_publish" => FeedPublish(FeedPublish),
    "limit_order_create" => LimitOrderCreate(LimitOrderCreate),
    "limit_order_cancel" => LimitOrderCancel(LimitOrderCancel),
    "delegate_vesting_shares" => DelegateVestingShares(DelegateVestingShares),
    "escrow_transfer" => EscrowTransfer(EscrowTransfer),
    "escrow_approve" => EscrowApprove(EscrowAction),
    "escrow_dispute" => EscrowDispute(EscrowAction),
    "escrow_release" => EscrowRelease(EscrowRelease),
    "proposal_create" => ProposalCreate(ProposalChange),
    "proposal_update" => ProposalUpdate(ProposalChange),
    "proposal_vote" => ProposalVote(ProposalVote),
    "witness_update" => WitnessUpdate(WitnessUpdate),
    // virtual operations
    "producer_reward" => ProducerReward(ProducerReward),
    "curation_reward" => CurationReward(CurationReward),
    "author_reward" => AuthorReward(AuthorReward),
    "comment_reward" => CommentReward(CommentReward),
    "interest" => Interest(Interest),
    "fill_vesting_withdraw" => FillVestingWithdraw(FillVestingWithdraw),
    "fill_order" => FillOrder(FillOrder),
    "effective_comment_vote" => EffectiveCommentVote(EffectiveCommentVote),
    "ineffective_delete_comment" => IneffectiveDeleteComment(PostRef),
    "liquidity_reward" => LiquidityReward(LiquidityReward),
    "fill_convert_request" => FillConvertRequest(FillConvertRequest),
    "comment_benefactor_reward" => CommentBenefactorReward(CommentBenefactorReward),
    "return_vesting_delegation" => ReturnVestingDelegation(ReturnVestingDelegation),
    "update_proposal_votes" => UpdateProposalVotes(UpdateProposalVotes),
}

fn zero_vests() -> Amount {
    Amount::new(0.0, 6, VESTS)
}

impl Operation {
    pub fn parse(raw: &RawOperation) -> Result<Self, OperationError> {
        Self::decode(&raw.op_type, &raw.payload)
    }

    /// System-generated operations (reward payouts, fills, ...)
    pub fn is_virtual(&self) -> bool {
        matches!(
            self,
            Operation::ProducerReward(_)
                | Operation::CurationReward(_)
                | Operation::AuthorReward(_)
                | Operation::CommentReward(_)
                | Operation::Interest(_)
                | Operation::FillVestingWithdraw(_)
                | Operation::FillOrder(_)
                | Operation::EffectiveCommentVote(_)
                | Operation::IneffectiveDeleteComment(_)
                | Operation::LiquidityReward(_)
                | Operation::FillConvertRequest(_)
                | Operation::CommentBenefactorReward(_)
                | Operation::ReturnVestingDelegation(_)
                | Operation::UpdateProposalVotes(_)
        )
    }

    /// VESTS-denominated amounts that must be converted to SP before the
    /// description can be written. Absent fields show up as zero VESTS.
    pub fn vests_fields(&self) -> Vec<Amount> {
        let or_zero = |a: &Option<Amount>| a.clone().unwrap_or_else(zero_vests);
        match self {
            Operation::ClaimRewardBalance(op) => vec![or_zero(&op.reward_vests)],
            Operation::ProducerReward(op) => vec![op.vesting_shares.clone()],
            Operation::CurationReward(op) => vec![op.reward.clone()],
            Operation::AuthorReward(op) => vec![or_zero(&op.vesting_payout)],
            Operation::CommentBenefactorReward(op) => vec![or_zero(&op.vesting_payout)],
            _ => Vec::new(),
        }
    }

    /// Accounts this operation refers to, in order of appearance
    pub fn accounts(&self) -> Vec<&str> {
        macro_rules! names {
            ($($e:expr),*) => { vec![$($e.as_str()),*] };
        }
        let all = match self {
            Operation::Transfer(op) => names![op.from, op.to],
            Operation::TransferToVesting(op) => names![op.from, op.to],
            Operation::WithdrawVesting(op) => names![op.account],
            Operation::Comment(op) => names![op.author, op.parent_author],
            Operation::Vote(op) => names![op.voter, op.author],
            Operation::ClaimRewardBalance(op) => names![op.account],
            Operation::ClaimAccount(op) => names![op.creator],
            Operation::CreateClaimedAccount(op) => names![op.creator, op.new_account_name],
            Operation::AccountUpdate(op) => names![op.account],
            Operation::AccountWitnessVote(op) => names![op.account, op.witness],
            Operation::AccountWitnessProxy(op) => {
                let mut v = names![op.account];
                v.extend(op.target());
                v
            }
            Operation::CustomJson(op) => vec![op.signer()],
            Operation::FeedPublish(op) => names![op.publisher],
            Operation::LimitOrderCreate(op) => names![op.owner],
            Operation::LimitOrderCancel(op) => names![op.owner],
            Operation::DelegateVestingShares(op) => names![op.delegator, op.delegatee],
            Operation::EscrowTransfer(op) => names![op.from, op.to, op.agent],
            Operation::EscrowApprove(op) | Operation::EscrowDispute(op) => names![op.who, op.from],
            Operation::EscrowRelease(op) => names![op.who, op.receiver],
            Operation::ProposalCreate(op) | Operation::ProposalUpdate(op) => names![op.creator],
            Operation::ProposalVote(op) => names![op.voter, op.proposal.creator],
            Operation::WitnessUpdate(op) => names![op.owner],
            Operation::ProducerReward(op) => names![op.producer],
            Operation::CurationReward(op) => names![op.curator, op.comment_author],
            Operation::AuthorReward(op) => names![op.author],
            Operation::CommentReward(op) => names![op.author],
            Operation::Interest(op) => names![op.owner],
            Operation::FillVestingWithdraw(op) => names![op.from_account],
            Operation::FillOrder(op) => names![op.current_owner],
            Operation::EffectiveCommentVote(op) => names![op.voter, op.author],
            Operation::IneffectiveDeleteComment(op) => names![op.author],
            Operation::LiquidityReward(op) => names![op.owner],
            Operation::FillConvertRequest(op) => names![op.owner],
            Operation::CommentBenefactorReward(op) => names![op.benefactor, op.author],
            Operation::ReturnVestingDelegation(op) => names![op.account],
            Operation::UpdateProposalVotes(op) => names![op.voter],
        };
        all.into_iter().filter(|a| !a.is_empty()).collect()
    }
}
