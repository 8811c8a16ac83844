//! The transaction-balancing engine
//!
//! Balancing a single transaction composes three steps: infer conversion
//! prices where exactly two commodities face each other, infer at most one
//! missing amount per posting class, then check that each class sums to a
//! value that looks zero at display precision. Balancing a whole journal
//! adds running-balance state: a first pass balances every transaction
//! without balance assignments, a second pass walks all postings in date
//! order, resolves assignments into deltas and verifies balance
//! assertions. The engine fails fast: the first error is returned and no
//! partial result escapes.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use log::{debug, trace};
use tally_math::{Amount, AmountPrice, MixedAmount, Precision, StyleMap};

use crate::account::{is_account_prefix_of, AccountName};
use crate::journal::Journal;
use crate::posting::{Posting, PostingType};
use crate::transaction::Transaction;

/// Options controlling the balancing engine.
#[derive(Debug, Clone)]
pub struct BalancingOpts {
    /// Skip balance assertion checking (assignments still execute)
    pub ignore_assertions: bool,
    /// Infer conversion prices in two-commodity transactions
    pub infer_transaction_prices: bool,
    /// Canonical commodity styles; derived from the journal when absent
    pub commodity_styles: Option<StyleMap>,
}

impl Default for BalancingOpts {
    fn default() -> Self {
        Self { ignore_assertions: false, infer_transaction_prices: true, commodity_styles: None }
    }
}

fn canonicalize(styles: Option<&StyleMap>, mixed: &MixedAmount) -> MixedAmount {
    match styles {
        Some(styles) => mixed.canonicalized(styles),
        None => mixed.clone(),
    }
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("  {}", line)).collect::<Vec<_>>().join("\n")
}

fn transaction_balance_error(t: &Transaction, diagnostics: &[String]) -> String {
    format!(
        "could not balance this transaction:\n{}\nat {}:\n{}",
        diagnostics.join("\n"),
        t.position,
        indent(&t.render())
    )
}

/// Check that a transaction balances, without modifying it. Returns one
/// diagnostic per failing posting class (real first), empty on success.
pub fn transaction_check_balanced(opts: &BalancingOpts, t: &Transaction) -> Vec<String> {
    let styles = opts.commodity_styles.as_ref();

    let class_message = |ptype: PostingType, label: &str| -> Option<String> {
        let postings: Vec<&Posting> = t.postings.iter().filter(|p| p.ptype == ptype).collect();

        // per-posting costs at display precision
        let costs: Vec<MixedAmount> = postings
            .iter()
            .filter_map(|p| p.amount.as_ref())
            .map(|m| canonicalize(styles, &m.to_cost()))
            .collect();
        let nonzeros: Vec<&MixedAmount> = costs.iter().filter(|c| !c.looks_zero()).collect();

        // Sign check, best effort: complain only when every nonzero
        // amount reports the same concrete sign. An indeterminate sign
        // (mixed signs inside one amount) passes.
        if nonzeros.len() >= 2 {
            let concrete: Vec<bool> = nonzeros.iter().filter_map(|c| c.is_negative()).collect();
            if concrete.len() == nonzeros.len()
                && (concrete.iter().all(|&neg| neg) || concrete.iter().all(|&neg| !neg))
            {
                return Some(format!("{} postings all have the same sign", label));
            }
        }

        // Sum check: the class's total cost must look zero.
        let sum: MixedAmount = postings.iter().filter_map(|p| p.amount.clone()).sum();
        let sum_cost = canonicalize(styles, &sum.to_cost());
        if !sum_cost.looks_zero() {
            return Some(format!("{} postings' sum should be 0 but is: {}", label, sum_cost));
        }

        None
    };

    let mut diagnostics = Vec::new();
    if let Some(msg) = class_message(PostingType::Regular, "real") {
        diagnostics.push(msg);
    }
    if let Some(msg) = class_message(PostingType::BalancedVirtual, "balanced virtual") {
        diagnostics.push(msg);
    }
    diagnostics
}

/// Does this transaction pass the balancedness check as-is?
pub fn is_balanced(opts: &BalancingOpts, t: &Transaction) -> bool {
    transaction_check_balanced(opts, t).is_empty()
}

/// Fill in at most one missing amount per posting class with the negated
/// cost of the others, restyled. Returns the inferred (account, amount)
/// pairs for the journal balancer's running balances.
fn infer_balancing_amount(
    styles: Option<&StyleMap>,
    mut t: Transaction,
) -> Result<(Transaction, Vec<(AccountName, MixedAmount)>), String> {
    let mut inferred = Vec::new();
    for (ptype, label) in
        [(PostingType::Regular, "real"), (PostingType::BalancedVirtual, "balanced virtual")]
    {
        let missing: Vec<usize> = t
            .postings
            .iter()
            .enumerate()
            .filter(|(_, p)| p.ptype == ptype && p.amount.is_none())
            .map(|(i, _)| i)
            .collect();

        if missing.len() > 1 {
            return Err(transaction_balance_error(
                &t,
                &[
                    format!("can't have more than one {} posting with no amount", label),
                    "(remember to put two or more spaces between account and amount)".to_string(),
                ],
            ));
        }

        if let Some(&idx) = missing.first() {
            let others: MixedAmount = t
                .postings
                .iter()
                .filter(|p| p.ptype == ptype)
                .filter_map(|p| p.amount.clone())
                .sum();
            // the other postings may carry prices; the inferred amount is
            // their cost-denominated negation, so printing stays balanced
            let mut amount = others.negated().to_cost();
            if let Some(styles) = styles {
                amount = amount.canonicalized(styles);
            }
            let posting = &mut t.postings[idx];
            posting.remember_original();
            posting.amount = Some(amount.clone());
            inferred.push((posting.account.clone(), amount));
        }
    }
    Ok((t, inferred))
}

/// Attach conversion prices in a class whose sum normalizes to exactly two
/// unpriced commodities of opposite sign.
fn infer_balancing_prices(t: Transaction) -> Transaction {
    let t = infer_prices_for_class(t, PostingType::Regular);
    infer_prices_for_class(t, PostingType::BalancedVirtual)
}

fn infer_prices_for_class(mut t: Transaction, ptype: PostingType) -> Transaction {
    // normalized amounts of this class, in posting order
    let class_amounts: Vec<Amount> = t
        .postings
        .iter()
        .filter(|p| p.ptype == ptype)
        .filter_map(|p| p.amount.as_ref())
        .flat_map(|m| m.amounts())
        .collect();

    let sum: MixedAmount =
        t.postings.iter().filter(|p| p.ptype == ptype).filter_map(|p| p.amount.clone()).sum();
    let sum_amounts = sum.amounts();
    if sum_amounts.len() != 2 {
        return t;
    }
    let (a, b) = (&sum_amounts[0], &sum_amounts[1]);
    if a.price.is_some() || b.price.is_some() || a.is_negative() == b.is_negative() {
        return t;
    }

    // (from, to) ordered by first appearance of either commodity across
    // the class's postings
    let Some((from, to)) = class_amounts.iter().find_map(|ca| {
        if ca.commodity == a.commodity {
            Some((a, b))
        } else if ca.commodity == b.commodity {
            Some((b, a))
        } else {
            None
        }
    }) else {
        return t;
    };

    let from_count = class_amounts.iter().filter(|ca| ca.commodity == from.commodity).count();
    let price = if from_count == 1 {
        // unambiguous: a total price preserves exactness
        AmountPrice::Total(Box::new(to.negated()))
    } else {
        let precision = match (from.style.precision, to.style.precision) {
            (Precision::Fixed(fp), Precision::Fixed(tp)) => {
                Precision::Fixed(fp.saturating_add(tp).max(2))
            }
            _ => Precision::Natural,
        };
        let unit = match to.negated().divided_by(&from.quantity) {
            Ok(unit) => unit.with_precision(precision),
            Err(_) => return t,
        };
        AmountPrice::Unit(Box::new(unit))
    };

    for p in t.postings.iter_mut().filter(|p| p.ptype == ptype) {
        let Some(mixed) = &p.amount else { continue };
        let Some(single) = mixed.only_amount() else { continue };
        if single.commodity == from.commodity && single.price.is_none() {
            p.remember_original();
            p.amount = Some(MixedAmount::from_amount(single.with_price(price.clone())));
        }
    }
    t
}

/// Balance one transaction standalone, also returning the amounts the
/// inferrer filled in. Balance assignments need journal context and are
/// treated here as ordinary missing amounts.
pub fn balance_transaction_with_inferred(
    opts: &BalancingOpts,
    t: Transaction,
) -> Result<(Transaction, Vec<(AccountName, MixedAmount)>), String> {
    let t = if opts.infer_transaction_prices { infer_balancing_prices(t) } else { t };
    let (mut t, inferred) = infer_balancing_amount(opts.commodity_styles.as_ref(), t)?;
    let diagnostics = transaction_check_balanced(opts, &t);
    if diagnostics.is_empty() {
        t.tie_knot();
        Ok((t, inferred))
    } else {
        Err(transaction_balance_error(&t, &diagnostics))
    }
}

/// Balance one transaction standalone: infer prices and amounts, then
/// check the zero-sum invariant.
pub fn balance_transaction(opts: &BalancingOpts, t: Transaction) -> Result<Transaction, String> {
    balance_transaction_with_inferred(opts, t).map(|(t, _)| t)
}

/// Scratch state for one journal-balancing run: the options with resolved
/// styles, the accounts closed to assignments, the mutable transaction
/// array keyed by index, and the running balance per account.
struct BalancingState {
    opts: BalancingOpts,
    unassignable: HashSet<AccountName>,
    check_assertions: bool,
    balances: HashMap<AccountName, MixedAmount>,
    txns: Vec<Transaction>,
}

/// A pass-2 work item: either a posting from an already-balanced
/// transaction, or a whole transaction still waiting on its assignments.
enum DatedItem {
    Posting { posting: Posting, date: NaiveDate, txn: usize },
    Transaction { txn: usize, date: NaiveDate },
}

impl DatedItem {
    fn date(&self) -> NaiveDate {
        match self {
            DatedItem::Posting { date, .. } => *date,
            DatedItem::Transaction { date, .. } => *date,
        }
    }
}

/// Balance a whole journal: balance every transaction, execute balance
/// assignments against date-ordered running balances, and verify balance
/// assertions. Returns the journal with inferred amounts and prices
/// filled in, or the first error.
pub fn balance_journal(opts: &BalancingOpts, mut journal: Journal) -> Result<Journal, String> {
    journal.number_transactions();

    // downstream checks use journal-wide styles unless the caller already
    // supplied them
    let styles = opts.commodity_styles.clone().unwrap_or_else(|| journal.canonical_styles());
    let bopts = BalancingOpts { commodity_styles: Some(styles), ..opts.clone() };
    let unassignable = journal.modifier_accounts();

    let mut state = BalancingState {
        check_assertions: !bopts.ignore_assertions,
        opts: bopts,
        unassignable,
        balances: HashMap::new(),
        txns: std::mem::take(&mut journal.transactions),
    };

    // Pass 1: in input order, balance every transaction without
    // assignments and explode it into posting items; keep the rest whole.
    debug!("balancing pass 1: {} transactions", state.txns.len());
    let mut items: Vec<DatedItem> = Vec::new();
    for i in 0..state.txns.len() {
        let t = &state.txns[i];
        if t.has_assignments() {
            items.push(DatedItem::Transaction { txn: i, date: t.date });
        } else {
            let (balanced, _) = balance_transaction_with_inferred(&state.opts, t.clone())?;
            for p in &balanced.postings {
                items.push(DatedItem::Posting {
                    posting: p.clone(),
                    date: p.effective_date(balanced.date),
                    txn: i,
                });
            }
            state.txns[i] = balanced;
        }
    }

    // Pass 2: walk everything by effective date, maintaining running
    // balances. The sort is stable, so same-day items keep input order.
    items.sort_by_key(DatedItem::date);
    debug!("balancing pass 2: {} dated items", items.len());
    for item in items {
        match item {
            DatedItem::Posting { posting, date, txn } => {
                process_posting_item(&mut state, &posting, date, txn)?;
            }
            DatedItem::Transaction { txn, date } => {
                process_assignment_transaction(&mut state, txn, date)?;
            }
        }
    }

    journal.transactions = state.txns;
    Ok(journal)
}

/// A posting from an already-balanced transaction: feed the running
/// balance and check its assertion, if any.
fn process_posting_item(
    state: &mut BalancingState,
    posting: &Posting,
    date: NaiveDate,
    txn: usize,
) -> Result<(), String> {
    let Some(amount) = &posting.amount else { return Ok(()) };
    let new_balance = add_to_balance(&mut state.balances, &posting.account, amount.strip_prices());
    if state.check_assertions && posting.assertion.is_some() {
        check_balance_assertion(&state.balances, posting, &state.txns[txn], date, &new_balance)?;
    }
    Ok(())
}

/// A transaction with balance assignments: resolve each assignment into a
/// delta against the running balances, then balance the whole transaction
/// now that its amounts are known.
fn process_assignment_transaction(
    state: &mut BalancingState,
    txn: usize,
    date: NaiveDate,
) -> Result<(), String> {
    let mut t = state.txns[txn].clone();
    trace!("resolving assignments in transaction {} ({})", t.index, t.date);

    for i in 0..t.postings.len() {
        check_illegal_assignment(&t.postings[i], &t, &state.unassignable)?;

        if let Some(amount) = t.postings[i].amount.clone() {
            let stripped = amount.strip_prices();
            t.postings[i].amount = Some(stripped.clone());
            let account = t.postings[i].account.clone();
            let new_balance = add_to_balance(&mut state.balances, &account, stripped);
            if state.check_assertions && t.postings[i].assertion.is_some() {
                check_balance_assertion(&state.balances, &t.postings[i], &t, date, &new_balance)?;
            }
        } else if t.postings[i].assertion.is_some() {
            resolve_assignment(state, &mut t, i, date)?;
        }
        // amountless and unasserted: leave it to the amount inferrer below
    }

    let (balanced, inferred) = balance_transaction_with_inferred(&state.opts, t)?;
    // postings whose amounts were only just inferred never went through
    // the loop above, so feed the running balances now
    for (account, amount) in inferred {
        add_to_balance(&mut state.balances, &account, amount);
    }
    state.txns[txn] = balanced;
    Ok(())
}

/// Turn one balance assignment into a concrete posting amount.
fn resolve_assignment(
    state: &mut BalancingState,
    t: &mut Transaction,
    i: usize,
    date: NaiveDate,
) -> Result<(), String> {
    let (account, assertion) = {
        let p = &t.postings[i];
        let Some(assertion) = p.assertion.clone() else { return Ok(()) };
        (p.account.clone(), assertion)
    };

    // the target balance: the asserted amount alone for a total
    // assignment, or laid over the account's other commodities for a
    // partial one
    let target = if assertion.total {
        MixedAmount::from_amount(assertion.amount.clone())
    } else {
        let others = state
            .balances
            .get(&account)
            .cloned()
            .unwrap_or_default()
            .filtered(|a| a.commodity != assertion.amount.commodity);
        others + &MixedAmount::from_amount(assertion.amount.clone())
    };
    trace!("assignment: {} := {}", account, target);

    let delta = if assertion.inclusive {
        set_inclusive_balance(&mut state.balances, &account, target.clone())
    } else {
        set_balance(&mut state.balances, &account, target.clone())
    };

    let p = &mut t.postings[i];
    p.remember_original();
    p.amount = Some(delta.filtered(|a| !a.is_really_zero()));

    if state.check_assertions {
        check_balance_assertion(&state.balances, &t.postings[i], t, date, &target)?;
    }
    Ok(())
}

/// Add an amount to an account's running balance, returning the new
/// balance.
fn add_to_balance(
    balances: &mut HashMap<AccountName, MixedAmount>,
    account: &AccountName,
    amount: MixedAmount,
) -> MixedAmount {
    let balance = balances.entry(account.clone()).or_default();
    *balance += amount;
    balance.clone()
}

/// Replace an account's running balance, returning the delta.
fn set_balance(
    balances: &mut HashMap<AccountName, MixedAmount>,
    account: &AccountName,
    target: MixedAmount,
) -> MixedAmount {
    let old = balances.insert(account.clone(), target.clone()).unwrap_or_default();
    target - &old
}

/// Set an account's balance so that it plus its subaccounts equals the
/// target, returning the delta of the account's own (exclusive) balance.
fn set_inclusive_balance(
    balances: &mut HashMap<AccountName, MixedAmount>,
    account: &AccountName,
    target: MixedAmount,
) -> MixedAmount {
    // TODO: maintain a prefix index if this full scan shows up in profiles
    let subaccount_sum: MixedAmount = balances
        .iter()
        .filter(|(name, _)| is_account_prefix_of(account, name.as_str()))
        .map(|(_, balance)| balance.clone())
        .sum();
    let old = balances.get(account).cloned().unwrap_or_default();
    let new_exclusive = target - &subaccount_sum;
    balances.insert(account.clone(), new_exclusive.clone());
    new_exclusive - &old
}

/// Reject balance assignments the engine cannot honor: ones with a custom
/// posting date, and ones on accounts touched by transaction-modifier
/// rules.
fn check_illegal_assignment(
    p: &Posting,
    t: &Transaction,
    unassignable: &HashSet<AccountName>,
) -> Result<(), String> {
    if !p.is_assignment() {
        return Ok(());
    }
    if p.date.is_some() {
        return Err(format!(
            "can't use balance assignment with custom posting date\n\nat {}:\n{}\nbalance assignments may not be used on postings with a custom posting date\n(the posting date would break date-ordered balancing)",
            t.position,
            indent(&t.render())
        ));
    }
    if unassignable.contains(&p.account) {
        return Err(format!(
            "can't use balance assignment with auto posting rules\n\naccount \"{}\" is modified by a transaction modifier rule\nat {}:\n{}\nbalance assignments may not be used on accounts affected by auto posting rules\n(the generated postings would break date-ordered balancing)",
            p.account,
            t.position,
            indent(&t.render())
        ));
    }
    Ok(())
}

/// Verify a posting's balance assertion against the running balance it
/// was processed at.
fn check_balance_assertion(
    balances: &HashMap<AccountName, MixedAmount>,
    posting: &Posting,
    parent: &Transaction,
    date: NaiveDate,
    actual: &MixedAmount,
) -> Result<(), String> {
    let Some(assertion) = &posting.assertion else { return Ok(()) };

    // inclusive assertions compare against the account plus every
    // subaccount seen so far
    let actual: MixedAmount = if assertion.inclusive {
        balances
            .iter()
            .filter(|(name, _)| {
                name.as_str() == posting.account.as_str()
                    || is_account_prefix_of(&posting.account, name.as_str())
            })
            .map(|(_, balance)| balance.clone())
            .sum()
    } else {
        actual.clone()
    };

    check_assertion_commodity(posting, parent, date, &assertion.amount, &actual)?;
    if assertion.total {
        // a total assertion implies zero for every other commodity present
        for other in actual.amounts_raw() {
            if other.commodity != assertion.amount.commodity {
                let implicit_zero = other.zeroed();
                check_assertion_commodity(posting, parent, date, &implicit_zero, &actual)?;
            }
        }
    }
    Ok(())
}

/// Compare one asserted commodity against the actual balance. The
/// comparison is exact: the user declared the expected value, display
/// precision does not apply.
fn check_assertion_commodity(
    posting: &Posting,
    parent: &Transaction,
    date: NaiveDate,
    asserted: &Amount,
    actual: &MixedAmount,
) -> Result<(), String> {
    let calculated = actual.amount_in_commodity(&asserted.commodity);
    if calculated.quantity == asserted.quantity {
        return Ok(());
    }

    let mut difference = asserted.clone();
    difference.quantity = &asserted.quantity - &calculated.quantity;
    let subs =
        if posting.assertion.as_ref().is_some_and(|a| a.inclusive) { " (and subs)" } else { "" };
    Err(format!(
        "balance assertion failed on {} in account \"{}\"{}\ncommodity:   {}\ncalculated:  {}\nasserted:    {}\ndifference:  {}\nat {}:\n{}",
        date.format("%Y-%m-%d"),
        posting.account,
        subs,
        asserted.commodity,
        calculated,
        asserted,
        difference,
        parent.position,
        indent(&parent.render())
    ))
}
