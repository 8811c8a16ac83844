//! Ledger data model and transaction-balancing engine
//!
//! This crate holds the double-entry data model (postings, transactions,
//! journals) and the engine that makes a journal consistent: it verifies
//! each transaction sums to zero per posting class, infers missing amounts
//! and conversion prices, executes balance assignments against date-ordered
//! running balances, and verifies balance assertions. Parsing and report
//! formatting live in surrounding layers; this crate takes `Journal`
//! values in and hands balanced ones out.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod account;
pub mod balancing;
pub mod journal;
pub mod posting;
pub mod transaction;

// Re-export main types
pub use account::{is_account_prefix_of, AccountName};
pub use balancing::{
    balance_journal, balance_transaction, balance_transaction_with_inferred, is_balanced,
    transaction_check_balanced, BalancingOpts,
};
pub use journal::{Journal, TransactionModifier};
pub use posting::{BalanceAssertion, Posting, PostingType};
pub use transaction::{SourcePosition, Transaction, TransactionStatus};
