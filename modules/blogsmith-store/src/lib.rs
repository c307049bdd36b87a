pub mod balance;
pub mod document;
pub mod memory;
pub mod pg;

pub use balance::{BalanceChecker, BalanceStatus, PgBalanceChecker};
pub use document::{latest, BlogDocument, DocumentStore};
pub use memory::{MemoryDocumentStore, StaticBalanceChecker};
pub use pg::{init_schema, PgDocumentStore};
