//! Authentication state held by the server process.

mod pending;

pub use pending::{PendingAuth, PendingAuthStore, PendingLookup};
