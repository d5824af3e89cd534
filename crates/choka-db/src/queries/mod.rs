//! Query primitives, grouped by table family. Each file adds methods to [`crate::Database`].

mod rooms;
mod social;
mod trips;
mod users;

pub use trips::TripFields;
pub use users::NewUser;

/// Builds `?1, ?2, ...` for an `IN (...)` list of `n` parameters.
pub(crate) fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}
