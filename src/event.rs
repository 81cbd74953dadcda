use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use crate::error::{CallbackKind, CallbackResult};
use crate::watcher::Deregistration;
use crate::{Scope, Value};

pub(crate) type EventListener = Rc<dyn Fn(&Event, &[Value]) -> CallbackResult>;

/// One emit or broadcast. Every listener reached by the propagation sees the
/// same instance.
pub struct Event {
	name: String,
	target_scope: Scope,
	current_scope: RefCell<Option<Scope>>,
	stoppable: bool,
	propagation_stopped: Cell<bool>,
	default_prevented: Cell<bool>,
}

impl Event {
	fn new(name: &str, target_scope: &Scope, stoppable: bool) -> Self {
		Event {
			name: name.to_string(),
			target_scope: target_scope.clone(),
			current_scope: RefCell::new(None),
			stoppable,
			propagation_stopped: Cell::new(false),
			default_prevented: Cell::new(false),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Scope the event was emitted or broadcast from.
	pub fn target_scope(&self) -> &Scope {
		&self.target_scope
	}

	/// Scope whose listeners are running. `None` once propagation is over.
	pub fn current_scope(&self) -> Option<Scope> {
		self.current_scope.borrow().clone()
	}

	/// Keeps an emitted event from reaching further ancestors. Listeners of
	/// the current scope still run. No effect on broadcasts.
	pub fn stop_propagation(&self) {
		if self.stoppable {
			self.propagation_stopped.set(true);
		}
	}

	pub fn is_propagation_stopped(&self) -> bool {
		self.propagation_stopped.get()
	}

	pub fn prevent_default(&self) {
		self.default_prevented.set(true);
	}

	pub fn is_default_prevented(&self) -> bool {
		self.default_prevented.get()
	}
}

impl Debug for Event {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Event")
			.field("name", &self.name)
			.field("propagation_stopped", &self.propagation_stopped.get())
			.field("default_prevented", &self.default_prevented.get())
			.finish()
	}
}

impl Scope {
	/// Registers `listener` for events named `name` on this scope.
	pub fn on<F>(&self, name: &str, listener: F) -> Deregistration
	where
		F: Fn(&Event, &[Value]) + 'static,
	{
		self.try_on(name, move |event, args| {
			listener(event, args);
			Ok(())
		})
	}

	/// [`Scope::on`] for a listener that can fail. An `Err` goes to the
	/// exception handler and dispatch continues.
	pub fn try_on<F>(&self, name: &str, listener: F) -> Deregistration
	where
		F: Fn(&Event, &[Value]) -> CallbackResult + 'static,
	{
		let listener: EventListener = Rc::new(listener);

		{
			let mut inner = self.body.inner.borrow_mut();
			if inner.watchers.is_none() {
				tracing::warn!(event = name, "listener registered on a destroyed scope, ignoring");
				return Deregistration::inert();
			}
			inner
				.listeners
				.entry(name.to_string())
				.or_default()
				.push(Some(listener.clone()));
		}

		let scope = Rc::downgrade(&self.body);
		let name = name.to_string();
		let listener = Rc::downgrade(&listener);
		Deregistration::new(move || {
			let (Some(body), Some(listener)) = (scope.upgrade(), listener.upgrade()) else {
				return;
			};
			let mut inner = body.inner.borrow_mut();
			let Some(slots) = inner.listeners.get_mut(&name) else {
				return;
			};
			// Null the slot instead of removing it, a dispatch may be walking
			// this list. It is compacted on the next dispatch.
			for slot in slots.iter_mut() {
				if slot.as_ref().map_or(false, |l| Rc::ptr_eq(l, &listener)) {
					*slot = None;
				}
			}
		})
	}

	/// Number of live listeners for `name` on this scope alone.
	pub fn listener_count(&self, name: &str) -> usize {
		self.body
			.inner
			.borrow()
			.listeners
			.get(name)
			.map_or(0, |slots| slots.iter().filter(|slot| slot.is_some()).count())
	}

	/// Fires `name` on this scope, then on each ancestor in turn, until the
	/// root or until a listener stops propagation.
	pub fn emit(&self, name: &str, args: &[Value]) -> Event {
		if self.is_destroyed() {
			tracing::warn!(event = name, "emit on a destroyed scope");
		}
		let event = Event::new(name, self, true);

		let mut scope = Some(self.clone());
		while let Some(current) = scope {
			*event.current_scope.borrow_mut() = Some(current.clone());
			current.fire(&event, args);
			if event.is_propagation_stopped() {
				break;
			}
			scope = current.parent();
		}

		*event.current_scope.borrow_mut() = None;
		event
	}

	/// Fires `name` on this scope and every descendant, pre-order.
	pub fn broadcast(&self, name: &str, args: &[Value]) -> Event {
		if self.is_destroyed() {
			tracing::warn!(event = name, "broadcast on a destroyed scope");
		}
		let event = Event::new(name, self, false);

		self.every_scope(&mut |scope| {
			*event.current_scope.borrow_mut() = Some(scope.clone());
			scope.fire(&event, args);
			true
		});

		*event.current_scope.borrow_mut() = None;
		event
	}

	fn fire(&self, event: &Event, args: &[Value]) {
		let mut index = 0;
		loop {
			let listener = {
				let mut inner = self.body.inner.borrow_mut();
				let Some(slots) = inner.listeners.get_mut(event.name()) else {
					return;
				};
				if index >= slots.len() {
					return;
				}
				match &slots[index] {
					Some(listener) => listener.clone(),
					None => {
						slots.remove(index);
						continue;
					}
				}
			};

			self.tree()
				.guarded(CallbackKind::Event, || listener(event, args));
			index += 1;
		}
	}
}
