mod error;
mod memory;
mod repository;
mod retry;
mod traits;

pub use error::*;
pub use memory::*;
pub use repository::*;
pub use retry::*;
pub use traits::*;

/// Schema migrations, applied in order on every start. Each one is idempotent.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("001_debts", include_str!("migrations/001_debts.sql")),
    ("002_expenses", include_str!("migrations/002_expenses.sql")),
    ("003_split_intents", include_str!("migrations/003_split_intents.sql")),
];
