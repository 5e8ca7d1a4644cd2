#![forbid(unsafe_code)]

use cx_kernel_contracts::catalog::CurrencyKind;
use cx_kernel_contracts::float::FloatStackRecord;
use rust_decimal::Decimal;

/// Units expected on hand right now: the opening count minus everything
/// spent or transferred away during the session.
pub fn current_count(entry: &FloatStackRecord) -> Decimal {
    Decimal::from(entry.open_count)
        - entry.spent_during_session
        - Decimal::from(entry.transferred_during_session)
}

/// The counted closing figure once one exists, the derived figure until then.
pub fn expected_close_count(entry: &FloatStackRecord) -> Decimal {
    match entry.close_count {
        Some(c) => Decimal::from(c),
        None => current_count(entry),
    }
}

/// Internal sanity predicate only; the close gate operates at the
/// repository/log level and never consults this.
pub fn closeable(entry: &FloatStackRecord) -> bool {
    match entry.close_count {
        Some(c) => Decimal::from(c) == Decimal::from(entry.open_count) - entry.spent_during_session,
        None => false,
    }
}

/// Explicit snapshot when present, else the open/close midpoint, else the
/// open spot alone.
pub fn average_spot(entry: &FloatStackRecord) -> Decimal {
    if let Some(avg) = entry.average_spot {
        return avg;
    }
    match entry.close_spot {
        Some(close) => (entry.open_spot + close) / Decimal::TWO,
        None => entry.open_spot,
    }
}

pub fn expected_close_value(entry: &FloatStackRecord, in_base_currency: bool) -> Decimal {
    let native = current_count(entry) * entry.denominated_value;
    if in_base_currency {
        native * average_spot(entry)
    } else {
        native
    }
}

/// Signed counted-minus-expected delta. Exact decimal subtraction; display
/// rounding must never feed this comparison.
pub fn off_balance(counted: Decimal, expected: Decimal) -> Decimal {
    counted - expected
}

/// A zero counted side is "not yet counted", not a balanced zero, so the
/// delta is only surfaced once both the delta and the counted side are
/// non-zero.
pub fn off_balance_showable(counted: Decimal, expected: Decimal) -> bool {
    counted != expected && counted != Decimal::ZERO
}

/// Counted-vs-derived delta for one stack, available once a closing count
/// has been recorded.
pub fn entry_off_balance(entry: &FloatStackRecord) -> Option<Decimal> {
    entry
        .close_count
        .map(|c| off_balance(Decimal::from(c), current_count(entry)))
}

/// Display-only rounding: 2 places for fiat, 8 for crypto/metal.
pub fn display_value(amount: Decimal, kind: CurrencyKind) -> Decimal {
    amount.round_dp(kind.display_scale())
}

/// Per-currency aggregation: each component is the per-entry sum weighted
/// by the entry's denominated face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyRollup {
    pub previous_session_sum: Decimal,
    pub open_session_sum: Decimal,
    pub close_session_sum: Decimal,
    pub current_session_sum: Decimal,
}

impl CurrencyRollup {
    pub fn from_entries(entries: &[&FloatStackRecord]) -> Self {
        let mut r = Self {
            previous_session_sum: Decimal::ZERO,
            open_session_sum: Decimal::ZERO,
            close_session_sum: Decimal::ZERO,
            current_session_sum: Decimal::ZERO,
        };
        for e in entries {
            r.previous_session_sum += Decimal::from(e.last_session_count) * e.denominated_value;
            r.open_session_sum += Decimal::from(e.open_count) * e.denominated_value;
            r.close_session_sum +=
                Decimal::from(e.close_count.unwrap_or(0)) * e.denominated_value;
            r.current_session_sum += expected_close_count(e) * e.denominated_value;
        }
        r
    }

    pub fn off_balance(&self) -> Decimal {
        off_balance(self.close_session_sum, self.current_session_sum)
    }

    pub fn off_balance_showable(&self) -> bool {
        off_balance_showable(self.close_session_sum, self.current_session_sum)
    }
}
