#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use cx_kernel_contracts::catalog::{CurrencyInfo, RepositoryInfo};
use cx_kernel_contracts::float::{FloatStackSeed, Ticker};

/// Expands the repository x currency x denomination cartesian product into
/// one seed row per cell. Inactive repositories contribute nothing; an
/// assigned ticker with no catalog currency behind it is skipped rather
/// than treated as an error. Face value and ticker are denormalized onto
/// the seed so reconciliation reads never join back into the catalog.
pub fn expand_plan(
    repositories: &[&RepositoryInfo],
    currencies: &BTreeMap<Ticker, CurrencyInfo>,
) -> Vec<FloatStackSeed> {
    let mut plan = Vec::new();
    for repo in repositories {
        if !repo.active {
            continue;
        }
        for ticker in &repo.currency_tickers {
            let Some(currency) = currencies.get(ticker) else {
                continue;
            };
            for denomination in &currency.denominations {
                plan.push(FloatStackSeed {
                    repository_id: repo.repository_id.clone(),
                    ticker: ticker.clone(),
                    denomination_id: denomination.denomination_id.clone(),
                    denominated_value: denomination.value,
                });
            }
        }
    }
    plan
}
