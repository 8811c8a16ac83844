//! The journal: an ordered sequence of transactions plus commodity styles

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tally_math::{Amount, AmountPrice, StyleMap};

use crate::account::AccountName;
use crate::posting::Posting;
use crate::transaction::Transaction;

/// A transaction-modifier rule ("auto posting" rule). Only the accounts of
/// its posting templates matter to the balancing engine: balance
/// assignments are forbidden on them, because generated postings would
/// change the running balances an assignment is derived from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionModifier {
    /// The query selecting the transactions this rule applies to
    pub query: String,
    /// Posting templates added to matched transactions
    pub posting_rules: Vec<Posting>,
}

/// An ordered sequence of transactions with the journal-level context the
/// balancing engine needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    /// Transactions in source order
    pub transactions: Vec<Transaction>,
    /// Canonical display styles per commodity, when already known
    pub commodity_styles: StyleMap,
    /// Transaction-modifier rules
    pub txn_modifiers: Vec<TransactionModifier>,
}

impl Journal {
    /// An empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction.
    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// Assign 1-based indexes in source order. The balancer keys its
    /// mutable transaction array by these.
    pub fn number_transactions(&mut self) {
        for (i, t) in self.transactions.iter_mut().enumerate() {
            t.index = i as u32 + 1;
        }
    }

    /// Derive canonical display styles from the amounts observed in this
    /// journal: per commodity, the first-seen style with precision
    /// widened to the maximum observed. Price amounts influence styles
    /// too.
    pub fn canonical_styles(&self) -> StyleMap {
        fn observe(styles: &mut StyleMap, amount: &Amount) {
            match styles.get_mut(&amount.commodity) {
                Some(style) => *style = style.merge(&amount.style),
                None => {
                    styles.insert(amount.commodity.clone(), amount.style.clone());
                }
            }
            match &amount.price {
                Some(AmountPrice::Unit(p)) | Some(AmountPrice::Total(p)) => observe(styles, p),
                None => {}
            }
        }

        let mut styles = StyleMap::new();
        for t in &self.transactions {
            for p in &t.postings {
                if let Some(mixed) = &p.amount {
                    for a in mixed.amounts_raw() {
                        observe(&mut styles, a);
                    }
                }
            }
        }
        // declared styles win over observed ones outright
        for (commodity, style) in &self.commodity_styles {
            styles.insert(commodity.clone(), style.clone());
        }
        styles
    }

    /// Accounts named by any transaction-modifier posting rule; balance
    /// assignments on these are rejected.
    pub fn modifier_accounts(&self) -> HashSet<AccountName> {
        self.txn_modifiers
            .iter()
            .flat_map(|m| m.posting_rules.iter())
            .map(|p| p.account.clone())
            .collect()
    }

    /// Format all transactions, separated by blank lines.
    pub fn render(&self) -> String {
        self.transactions.iter().map(Transaction::render).collect::<Vec<_>>().join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tally_math::Precision;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_number_transactions() {
        let mut j = Journal::new();
        j.add_transaction(Transaction::new(date(2019, 1, 1), "a"));
        j.add_transaction(Transaction::new(date(2019, 1, 2), "b"));
        j.number_transactions();
        assert_eq!(j.transactions[0].index, 1);
        assert_eq!(j.transactions[1].index, 2);
    }

    #[test]
    fn test_canonical_styles_widen_precision() {
        let mut j = Journal::new();
        j.add_transaction(Transaction::with_postings(
            date(2019, 1, 1),
            "x",
            vec![
                Posting::with_amount("a", Amount::from_decimal("USD", Decimal::new(5, 0))),
                Posting::with_amount("b", Amount::from_decimal("USD", Decimal::new(-500, 2))),
            ],
        ));

        let styles = j.canonical_styles();
        assert_eq!(styles["USD"].precision, Precision::Fixed(2));
    }

    #[test]
    fn test_canonical_styles_see_price_commodities() {
        let priced = Amount::from_i64("EUR", 3)
            .with_price(AmountPrice::Total(Box::new(Amount::from_decimal(
                "USD",
                Decimal::new(400, 2),
            ))));
        let mut j = Journal::new();
        j.add_transaction(Transaction::with_postings(
            date(2019, 1, 1),
            "x",
            vec![Posting::with_amount("a", priced)],
        ));

        let styles = j.canonical_styles();
        assert_eq!(styles["EUR"].precision, Precision::Fixed(0));
        assert_eq!(styles["USD"].precision, Precision::Fixed(2));
    }

    #[test]
    fn test_modifier_accounts() {
        let mut j = Journal::new();
        j.txn_modifiers.push(TransactionModifier {
            query: "expenses".into(),
            posting_rules: vec![Posting::new("budget:food"), Posting::new("budget:reserve")],
        });
        let accounts = j.modifier_accounts();
        assert!(accounts.contains("budget:food"));
        assert!(accounts.contains("budget:reserve"));
        assert_eq!(accounts.len(), 2);
    }
}
