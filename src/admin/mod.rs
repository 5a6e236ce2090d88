/// Admin operations
///
/// Role assignment and account lifecycle transitions. Every operation here
/// verifies the actor's capability before touching the database, and performs
/// its writes (including the audit entry) in a single transaction.
mod lifecycle;
mod roles;

pub use lifecycle::{AccountLifecycleManager, StateChangeOutcome};
pub use roles::{RoleAssignment, RoleChangeOutcome, RoleManager};
