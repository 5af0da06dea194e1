// Application layer: the recorder, ledger queries, settlement and the
// facade that wires them to a store.

pub mod cache;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod recorder;
pub mod reconcile;
pub mod reporting;
pub mod service;
pub mod settlement;

pub use cache::*;
pub use error::*;
pub use ledger::LedgerService;
pub use locks::*;
pub use recorder::*;
pub use reconcile::*;
pub use reporting::*;
pub use service::*;
pub use settlement::*;

use chrono::{Local, NaiveDate};

use crate::domain::PersonBalance;

/// Per-person balances keyed by the normalized person.
pub type BalanceCache = TtlCache<String, PersonBalance>;

/// The local calendar date, used when a caller leaves the date out.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
