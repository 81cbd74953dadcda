use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use crate::error::CallbackResult;
use crate::hashed::Hashed;
use crate::{Scope, Value};

pub type WatchFn = Box<dyn Fn(&Scope) -> Value>;
pub type Listener = Box<dyn Fn(&Value, &Value, &Scope)>;

type TryWatchFn = Box<dyn Fn(&Scope) -> CallbackResult<Value>>;
type TryListener = Box<dyn Fn(&Value, &Value, &Scope) -> CallbackResult>;

/// How a watcher decides that its value changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Equality {
	/// Identity, with NaN equal to NaN.
	#[default]
	Reference,
	/// Structural comparison against a deep copy of the last value.
	Value,
}

enum Last {
	/// Never evaluated. Differs from every value, `Undefined` included.
	Initial,
	Reference(Value),
	Deep(Hashed<Value>),
}

pub(crate) struct Watcher {
	watch_fn: TryWatchFn,
	listener: Option<TryListener>,
	equality: Equality,
	last: RefCell<Last>,
	removed: Cell<bool>,
}

impl Watcher {
	fn new(watch_fn: TryWatchFn, listener: Option<TryListener>, equality: Equality) -> Self {
		Watcher {
			watch_fn,
			listener,
			equality,
			last: RefCell::new(Last::Initial),
			removed: Cell::new(false),
		}
	}

	pub fn evaluate(&self, scope: &Scope) -> CallbackResult<Value> {
		(self.watch_fn)(scope)
	}

	pub fn is_dirty(&self, value: &Value) -> bool {
		match &*self.last.borrow() {
			Last::Initial => true,
			Last::Reference(last) => !last.same(value),
			Last::Deep(last) => !last.matches(value),
		}
	}

	/// Stores `value` as the last seen value and returns the previous one.
	/// On the first call the previous value is `value` itself.
	pub fn record(&self, value: &Value) -> Value {
		let next = match self.equality {
			Equality::Reference => Last::Reference(value.clone()),
			Equality::Value => Last::Deep(Hashed::snapshot(value)),
		};
		match std::mem::replace(&mut *self.last.borrow_mut(), next) {
			Last::Initial => value.clone(),
			Last::Reference(old) => old,
			Last::Deep(old) => old.value,
		}
	}

	pub fn notify(&self, value: &Value, old: &Value, scope: &Scope) -> CallbackResult {
		match &self.listener {
			Some(listener) => listener(value, old, scope),
			None => Ok(()),
		}
	}

	pub fn is_removed(&self) -> bool {
		self.removed.get()
	}

	/// Returns whether the watcher was already removed.
	pub fn mark_removed(&self) -> bool {
		self.removed.replace(true)
	}
}

/// Undoes a registration made by `watch*` or `on`. Calling it more than
/// once is harmless.
#[derive(Clone)]
pub struct Deregistration {
	func: Option<Rc<dyn Fn()>>,
}

impl Deregistration {
	pub(crate) fn new(func: impl Fn() + 'static) -> Self {
		Deregistration {
			func: Some(Rc::new(func)),
		}
	}

	/// Handle for a registration that never happened.
	pub(crate) fn inert() -> Self {
		Deregistration { func: None }
	}

	pub fn deregister(&self) {
		if let Some(func) = &self.func {
			func()
		}
	}
}

impl Debug for Deregistration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Deregistration")
			.field("inert", &self.func.is_none())
			.finish()
	}
}

impl Scope {
	/// Registers a reference-equality watcher.
	pub fn watch<W, L>(&self, watch_fn: W, listener: L) -> Deregistration
	where
		W: Fn(&Scope) -> Value + 'static,
		L: Fn(&Value, &Value, &Scope) + 'static,
	{
		self.watch_with(watch_fn, Some(Box::new(listener)), Equality::Reference)
	}

	/// Registers a watcher that compares deep copies of the watched value.
	pub fn watch_value<W, L>(&self, watch_fn: W, listener: L) -> Deregistration
	where
		W: Fn(&Scope) -> Value + 'static,
		L: Fn(&Value, &Value, &Scope) + 'static,
	{
		self.watch_with(watch_fn, Some(Box::new(listener)), Equality::Value)
	}

	pub fn watch_with<W>(
		&self,
		watch_fn: W,
		listener: Option<Listener>,
		equality: Equality,
	) -> Deregistration
	where
		W: Fn(&Scope) -> Value + 'static,
	{
		let listener = listener.map(|listener| -> TryListener {
			Box::new(move |value: &Value, old: &Value, scope: &Scope| {
				listener(value, old, scope);
				Ok(())
			})
		});
		self.register(Box::new(move |scope: &Scope| Ok(watch_fn(scope))), listener, equality)
	}

	/// Registers a watcher whose watch function and listener report failures
	/// as `Err` instead of panicking. A failed evaluation leaves the last
	/// value untouched, so the watcher is checked again on the next sweep.
	pub fn try_watch_with<W, L>(&self, watch_fn: W, listener: L, equality: Equality) -> Deregistration
	where
		W: Fn(&Scope) -> CallbackResult<Value> + 'static,
		L: Fn(&Value, &Value, &Scope) -> CallbackResult + 'static,
	{
		self.register(Box::new(watch_fn), Some(Box::new(listener)), equality)
	}

	fn register(
		&self,
		watch_fn: TryWatchFn,
		listener: Option<TryListener>,
		equality: Equality,
	) -> Deregistration {
		let watcher = Rc::new(Watcher::new(watch_fn, listener, equality));

		match self.body.inner.borrow_mut().watchers.as_mut() {
			Some(watchers) => watchers.push(watcher.clone()),
			None => {
				tracing::warn!("watch registered on a destroyed scope, ignoring");
				return Deregistration::inert();
			}
		}
		self.tree().reset_last_dirty();

		let scope = Rc::downgrade(&self.body);
		let watcher = Rc::downgrade(&watcher);
		Deregistration::new(move || {
			let Some(watcher) = watcher.upgrade() else {
				return;
			};
			if watcher.mark_removed() {
				return;
			}
			if let Some(body) = scope.upgrade() {
				if let Some(watchers) = body.inner.borrow_mut().watchers.as_mut() {
					watchers.retain(|other| !Rc::ptr_eq(other, &watcher));
				}
				body.tree.reset_last_dirty();
			}
		})
	}

	pub fn watcher_count(&self) -> usize {
		self.body
			.inner
			.borrow()
			.watchers
			.as_ref()
			.map_or(0, Vec::len)
	}

	/// Newest first, as the digest visits them.
	pub(crate) fn watchers_newest_first(&self) -> Vec<Rc<Watcher>> {
		let inner = self.body.inner.borrow();
		match inner.watchers.as_ref() {
			Some(watchers) => watchers.iter().rev().cloned().collect(),
			None => Vec::new(),
		}
	}
}
