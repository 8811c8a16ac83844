//! Postings: the lines within a transaction charging an account

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_math::{Amount, MixedAmount};

use crate::account::AccountName;
use crate::transaction::SourcePosition;

/// How a posting participates in balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PostingType {
    /// An ordinary posting; must balance with the other real postings
    #[default]
    Regular,
    /// A virtual posting, written `(account)`; excluded from balancing
    Virtual,
    /// A balanced virtual posting, written `[account]`; must balance with
    /// the other balanced virtual postings
    BalancedVirtual,
}

/// A balance assertion (or, on an amountless posting, a balance
/// assignment): the account's running balance at this point must equal
/// `amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceAssertion {
    /// The expected balance in one commodity
    pub amount: Amount,
    /// `==`: every other commodity in the account must be zero
    pub total: bool,
    /// `=*`: include subaccounts in the compared balance
    pub inclusive: bool,
    /// Where the assertion was written
    pub position: SourcePosition,
}

impl BalanceAssertion {
    /// A plain partial, subaccount-exclusive assertion (`=`).
    pub fn new(amount: Amount) -> Self {
        Self { amount, total: false, inclusive: false, position: SourcePosition::default() }
    }

    /// Make this a total assertion (`==`).
    pub fn total(mut self) -> Self {
        self.total = true;
        self
    }

    /// Make this a subaccount-inclusive assertion (`=*`).
    pub fn inclusive(mut self) -> Self {
        self.inclusive = true;
        self
    }

    /// The journal operator spelling this assertion.
    pub fn operator(&self) -> &'static str {
        match (self.total, self.inclusive) {
            (false, false) => "=",
            (false, true) => "=*",
            (true, false) => "==",
            (true, true) => "==*",
        }
    }
}

/// A single line within a transaction charging an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// The account charged
    pub account: AccountName,
    /// The amount, `None` until inferred or assigned
    pub amount: Option<MixedAmount>,
    /// Posting class
    pub ptype: PostingType,
    /// Explicit posting date overriding the transaction date
    pub date: Option<NaiveDate>,
    /// Balance assertion, or assignment when the amount is missing
    pub assertion: Option<BalanceAssertion>,
    /// Trailing comment text
    pub comment: String,
    /// Tags parsed from the comment
    pub tags: Vec<(String, String)>,
    /// Index of the parent transaction, tied when the parent is balanced
    pub transaction_index: Option<u32>,
    /// The posting as the user wrote it, kept when the engine rewrites
    /// the amount so printing can round-trip the source
    pub original: Option<Box<Posting>>,
}

impl Posting {
    /// An amountless regular posting on an account.
    pub fn new(account: impl Into<AccountName>) -> Self {
        Self {
            account: account.into(),
            amount: None,
            ptype: PostingType::default(),
            date: None,
            assertion: None,
            comment: String::new(),
            tags: Vec::new(),
            transaction_index: None,
            original: None,
        }
    }

    /// A regular posting with an amount.
    pub fn with_amount(account: impl Into<AccountName>, amount: impl Into<MixedAmount>) -> Self {
        let mut p = Self::new(account);
        p.amount = Some(amount.into());
        p
    }

    /// This posting with another posting class.
    pub fn of_type(mut self, ptype: PostingType) -> Self {
        self.ptype = ptype;
        self
    }

    /// This posting with a balance assertion attached.
    pub fn asserting(mut self, assertion: BalanceAssertion) -> Self {
        self.assertion = Some(assertion);
        self
    }

    /// This posting with an explicit posting date.
    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Does this posting have an amount yet?
    pub fn has_amount(&self) -> bool {
        self.amount.is_some()
    }

    /// A balance assignment: an assertion on a posting with no amount,
    /// asking the engine to derive the delta.
    pub fn is_assignment(&self) -> bool {
        self.amount.is_none() && self.assertion.is_some()
    }

    /// The date this posting takes effect: its own date when overridden,
    /// else the transaction's.
    pub fn effective_date(&self, transaction_date: NaiveDate) -> NaiveDate {
        self.date.unwrap_or(transaction_date)
    }

    /// Remember the current form as the original, unless one is already
    /// recorded. Called just before the engine rewrites the amount.
    pub fn remember_original(&mut self) {
        if self.original.is_none() {
            let mut shadow = self.clone();
            shadow.original = None;
            self.original = Some(Box::new(shadow));
        }
    }

    /// The account name as written in a journal, with virtual wrapping.
    pub fn display_account(&self) -> String {
        match self.ptype {
            PostingType::Regular => self.account.to_string(),
            PostingType::Virtual => format!("({})", self.account),
            PostingType::BalancedVirtual => format!("[{}]", self.account),
        }
    }

    /// Format this posting as one journal line, the account padded to
    /// `account_width`.
    pub fn render(&self, account_width: usize) -> String {
        let mut line = format!("    {:<width$}", self.display_account(), width = account_width);
        if let Some(amount) = &self.amount {
            line.push_str("  ");
            line.push_str(&amount.to_string());
        }
        if let Some(assertion) = &self.assertion {
            line.push_str(&format!(" {} {}", assertion.operator(), assertion.amount));
        }
        if let Some(date) = self.date {
            line.push_str(&format!("  ; [{}]", date.format("%Y-%m-%d")));
        }
        line.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_detection() {
        let assertion = BalanceAssertion::new(Amount::from_i64("USD", 1));
        let assignment = Posting::new("a").asserting(assertion.clone());
        assert!(assignment.is_assignment());

        let plain_assertion =
            Posting::with_amount("a", Amount::from_i64("USD", 1)).asserting(assertion);
        assert!(!plain_assertion.is_assignment());

        assert!(!Posting::new("a").is_assignment());
    }

    #[test]
    fn test_remember_original_is_idempotent() {
        let mut p = Posting::new("a");
        p.remember_original();
        let first = p.original.clone();

        p.amount = Some(MixedAmount::from_amount(Amount::from_i64("USD", 5)));
        p.remember_original();
        assert_eq!(p.original, first);
    }

    #[test]
    fn test_render_regular_posting() {
        let p = Posting::with_amount("expenses:food", Amount::from_i64("USD", 5));
        assert_eq!(p.render(13), "    expenses:food  5 USD");
    }

    #[test]
    fn test_render_pads_short_accounts() {
        let p = Posting::with_amount("a", Amount::from_i64("USD", -5));
        assert_eq!(p.render(13), "    a              -5 USD");
    }

    #[test]
    fn test_render_virtual_posting_with_assertion() {
        let p = Posting::new("a")
            .of_type(PostingType::Virtual)
            .asserting(BalanceAssertion::new(Amount::from_i64("", 1)));
        assert_eq!(p.render(3), "    (a) = 1");
    }

    #[test]
    fn test_assertion_operators() {
        let a = BalanceAssertion::new(Amount::from_i64("USD", 1));
        assert_eq!(a.operator(), "=");
        assert_eq!(a.clone().total().operator(), "==");
        assert_eq!(a.clone().inclusive().operator(), "=*");
        assert_eq!(a.total().inclusive().operator(), "==*");
    }
}
