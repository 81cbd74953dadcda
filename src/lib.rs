//! Dirty-checking scope trees.
//!
//! A [`Scope`] holds attributes, watchers and event listeners. Calling
//! [`Scope::digest`] evaluates every watcher of the scope and its
//! descendants, firing listeners for changed values, until the tree
//! settles. Work can be queued into a digest ([`Scope::eval_async`]),
//! coalesced into a future one ([`Scope::apply_async`]) or run after one
//! ([`Scope::post_digest`]). Events travel up ([`Scope::emit`]) or down
//! ([`Scope::broadcast`]) the tree independently of digests.

pub mod macros;

mod addr;
mod collection;
mod config;
mod digest;
mod error;
mod event;
mod group;
mod hashed;
mod locals;
mod phase;
mod schedule;
mod scope;
mod timer;
mod tree;
mod value;
mod watcher;

pub use config::{RootOptions, DEFAULT_TTL};
pub use error::{
	CallbackError, CallbackFailure, CallbackKind, CallbackResult, DigestError, ExceptionHandler,
	TracingExceptionHandler,
};
pub use event::Event;
pub use hashed::Hashed;
pub use locals::Locals;
pub use phase::Phase;
pub use scope::{Scope, DESTROY_EVENT};
#[cfg(target_arch = "wasm32")]
pub use timer::MicrotaskScheduler;
pub use timer::{ManualScheduler, Scheduler, TimerId};
pub use value::{Array, Object, Value};
pub use watcher::{Deregistration, Equality, Listener, WatchFn};
