//! Directory-backed persistent key-value storage.
//!
//! Both the checkpoint store and the history cache sit on top of [`JsonStore`].

mod json_store;
mod key_lock;

pub use json_store::{Entry, JsonStore};
pub use key_lock::KeyLock;
