//! Per-account article sync: a lease lock around an idempotent,
//! cancellable pull from the content API into Postgres.

pub mod lock_manager;
pub mod retry;
pub mod source;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
