use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::watcher::{Deregistration, WatchFn};
use crate::{Scope, Value};

struct GroupState {
	new_values: Vec<Value>,
	old_values: Vec<Value>,
	scheduled: bool,
	first_run: bool,
}

impl Scope {
	/// Watches several values at once. `listener` runs at most once per
	/// digest with the current and previous values, indexed like
	/// `watch_fns`. On the first run both slices are the same slice.
	pub fn watch_group<L>(&self, watch_fns: Vec<WatchFn>, listener: L) -> Deregistration
	where
		L: Fn(&[Value], &[Value], &Scope) + 'static,
	{
		if watch_fns.is_empty() {
			let should_call = Rc::new(Cell::new(true));
			self.eval_async({
				let should_call = should_call.clone();
				move |scope| {
					if should_call.get() {
						listener(&[], &[], scope);
					}
				}
			});
			return Deregistration::new(move || should_call.set(false));
		}

		let state = Rc::new(RefCell::new(GroupState {
			new_values: vec![Value::Undefined; watch_fns.len()],
			old_values: vec![Value::Undefined; watch_fns.len()],
			scheduled: false,
			first_run: true,
		}));
		let listener = Rc::new(listener);

		let deregistrations: Vec<Deregistration> = watch_fns
			.into_iter()
			.enumerate()
			.map(|(index, watch_fn)| {
				let state = state.clone();
				let listener = listener.clone();
				self.watch(watch_fn, move |value, old, scope| {
					let schedule = {
						let mut state = state.borrow_mut();
						state.new_values[index] = value.clone();
						state.old_values[index] = old.clone();
						!std::mem::replace(&mut state.scheduled, true)
					};
					if schedule {
						let state = state.clone();
						let listener = listener.clone();
						scope.eval_async(move |scope| {
							let (new_values, old_values, first_run) = {
								let mut state = state.borrow_mut();
								state.scheduled = false;
								let first_run = std::mem::replace(&mut state.first_run, false);
								(state.new_values.clone(), state.old_values.clone(), first_run)
							};
							if first_run {
								listener(&new_values, &new_values, scope);
							} else {
								listener(&new_values, &old_values, scope);
							}
						});
					}
				})
			})
			.collect();

		Deregistration::new(move || {
			for deregistration in &deregistrations {
				deregistration.deregister();
			}
		})
	}
}
