//! This is a library for client-side state kept against a hosted database.
//! It was created for TripSync, so it doesn't include much that was not
//! needed for that project.
//!
//! What it gives you:
//! 1. [`Table`]: an in-memory table of rows keyed by id, with filtered and
//!    ordered reads, per-row and all-or-nothing batch writes, and write-fault
//!    injection for exercising failure paths in tests.
//! 2. [`ChangeHub`]: payload-free change notifications. Listeners subscribe
//!    to a table (optionally narrowed to one parent row); publishers either
//!    deliver immediately or mark changes and flush a whole burst at once, in
//!    which case each listener hears a burst exactly once.
//! 3. `supabase` (feature): a thin PostgREST client for talking to a
//!    Supabase project over its REST endpoint.
//!
//! The library assumes a single-threaded caller (a browser session or a
//! test); everything is `RefCell`-based and nothing is `Send`.

pub mod changes;
pub mod error;
pub mod table;

#[cfg(feature = "supabase")]
pub mod supabase;

pub use changes::{Change, ChangeFilter, ChangeHub, ListenerKey};
pub use error::StoreError;
pub use table::Table;
