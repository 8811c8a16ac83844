//! Transactions: dated groups of postings

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::posting::{Posting, PostingType};

/// Where a journal construct was written. The engine carries positions
/// into error messages but never interprets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    /// Source file, when known
    pub file: Option<String>,
    /// 1-based line number; 0 when unknown
    pub line: u32,
}

impl SourcePosition {
    /// A position at a line of a named file.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self { file: Some(file.into()), line }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}", file, self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

/// Transaction status marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// No marker
    #[default]
    Uncleared,
    /// Cleared (`*`)
    Cleared,
    /// Pending (`!`)
    Pending,
}

/// A dated journal entry with its postings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// 1-based position in the journal, assigned by the numbering pass;
    /// the journal balancer keys its transaction array by this
    pub index: u32,
    /// Primary date
    pub date: NaiveDate,
    /// Optional secondary date
    pub date2: Option<NaiveDate>,
    /// Where the transaction was written
    pub position: SourcePosition,
    /// Status marker
    pub status: TransactionStatus,
    /// Optional code, e.g. a check number
    pub code: Option<String>,
    /// Payee / description text
    pub description: String,
    /// Trailing comment text
    pub comment: String,
    /// Tags parsed from the comment
    pub tags: Vec<(String, String)>,
    /// The postings, in source order
    pub postings: Vec<Posting>,
}

impl Transaction {
    /// Create an empty transaction on a date.
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            index: 0,
            date,
            date2: None,
            position: SourcePosition::default(),
            status: TransactionStatus::default(),
            code: None,
            description: description.into(),
            comment: String::new(),
            tags: Vec::new(),
            postings: Vec::new(),
        }
    }

    /// Create a transaction with postings, the common test shape.
    pub fn with_postings(
        date: NaiveDate,
        description: impl Into<String>,
        postings: Vec<Posting>,
    ) -> Self {
        let mut t = Self::new(date, description);
        t.postings = postings;
        t
    }

    /// Add a posting to this transaction.
    pub fn add_posting(&mut self, posting: Posting) {
        self.postings.push(posting);
    }

    /// The postings of one class.
    pub fn postings_of_type(&self, ptype: PostingType) -> impl Iterator<Item = &Posting> {
        self.postings.iter().filter(move |p| p.ptype == ptype)
    }

    /// The balance-assignment postings (amountless, with an assertion).
    pub fn assignment_postings(&self) -> impl Iterator<Item = &Posting> {
        self.postings.iter().filter(|p| p.is_assignment())
    }

    /// Does any posting carry a balance assignment?
    pub fn has_assignments(&self) -> bool {
        self.postings.iter().any(Posting::is_assignment)
    }

    /// Point each posting back at this transaction by index. Done when a
    /// transaction leaves the balancer, so postings can be traced to
    /// their entry on their own.
    pub fn tie_knot(&mut self) {
        for p in &mut self.postings {
            p.transaction_index = Some(self.index);
        }
    }

    /// Format this transaction the way it would appear in a journal:
    /// date, status, code and description on the first line, postings
    /// aligned below.
    pub fn render(&self) -> String {
        let status = match self.status {
            TransactionStatus::Uncleared => "",
            TransactionStatus::Cleared => " *",
            TransactionStatus::Pending => " !",
        };
        let code = self.code.as_ref().map(|c| format!(" ({})", c)).unwrap_or_default();
        let header =
            format!("{}{}{} {}", self.date.format("%Y-%m-%d"), status, code, self.description);
        let mut out = header.trim_end().to_string();

        let width = self
            .postings
            .iter()
            .map(|p| p.display_account().chars().count())
            .max()
            .unwrap_or(0);
        for p in &self.postings {
            out.push('\n');
            out.push_str(&p.render(width));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::BalanceAssertion;
    use tally_math::Amount;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_has_assignments() {
        let plain = Transaction::with_postings(
            date(2019, 1, 1),
            "x",
            vec![
                Posting::with_amount("a", Amount::from_i64("USD", -5)),
                Posting::new("b"),
            ],
        );
        assert!(!plain.has_assignments());

        let assigned = Transaction::with_postings(
            date(2019, 1, 1),
            "x",
            vec![Posting::new("a").asserting(BalanceAssertion::new(Amount::from_i64("USD", 1)))],
        );
        assert!(assigned.has_assignments());
        assert_eq!(assigned.assignment_postings().count(), 1);
    }

    #[test]
    fn test_tie_knot() {
        let mut t = Transaction::with_postings(
            date(2019, 1, 1),
            "x",
            vec![Posting::new("a"), Posting::new("b")],
        );
        t.index = 7;
        t.tie_knot();
        assert!(t.postings.iter().all(|p| p.transaction_index == Some(7)));
    }

    #[test]
    fn test_render_aligns_postings() {
        let mut t = Transaction::with_postings(
            date(2019, 1, 1),
            "groceries",
            vec![
                Posting::with_amount("expenses:food", Amount::from_i64("USD", 5)),
                Posting::with_amount("assets:cash", Amount::from_i64("USD", -5)),
            ],
        );
        t.status = TransactionStatus::Cleared;
        assert_eq!(
            t.render(),
            "2019-01-01 * groceries\n    expenses:food  5 USD\n    assets:cash    -5 USD"
        );
    }

    #[test]
    fn test_render_empty_description() {
        let t = Transaction::new(date(2019, 1, 1), "");
        assert_eq!(t.render(), "2019-01-01");
    }

    #[test]
    fn test_position_display() {
        assert_eq!(SourcePosition::new("main.journal", 12).to_string(), "main.journal:12");
        assert_eq!(SourcePosition::default().to_string(), "line 0");
    }
}
