mod debt;
mod expense;
mod ledger;
mod money;
mod settlement;

pub use debt::*;
pub use expense::*;
pub use ledger::*;
pub use money::*;
pub use settlement::*;
