use std::cell::RefCell;
use std::rc::Rc;

use fxhash::FxHashMap;

use crate::value::Object;
use crate::watcher::Deregistration;
use crate::{Scope, Value};

/// How a watched value is diffed on one pass.
enum Shape<'a> {
	/// Real arrays and objects with a usable `length`, as their elements.
	ArrayLike(Vec<Value>),
	Keyed(&'a Object),
	Scalar,
}

/// Array-likes are arrays, and objects whose `length` is a non-negative
/// integer that is either zero or has an element at `length - 1`. A
/// `length` larger than the object's own entry count marks a sparse object,
/// which is diffed by key.
fn classify(value: &Value) -> Shape<'_> {
	match value {
		Value::Array(array) => Shape::ArrayLike(array.to_vec()),
		Value::Object(object) => match pseudo_array_len(object) {
			Some(len) => Shape::ArrayLike((0..len).map(|i| object.get(&i.to_string())).collect()),
			None => Shape::Keyed(object),
		},
		_ => Shape::Scalar,
	}
}

fn pseudo_array_len(object: &Object) -> Option<usize> {
	let length = object.get("length").as_f64()?;
	if length < 0.0 || length.fract() != 0.0 {
		return None;
	}
	if length >= object.len() as f64 {
		return None;
	}
	let length = length as usize;
	(length == 0 || object.contains_key(&(length - 1).to_string())).then_some(length)
}

/// Our copy of the previous pass, mutated in place as differences are found.
enum Shadow {
	Scalar(Value),
	Array(Vec<Value>),
	Map(FxHashMap<String, Value>),
}

struct CollectionState {
	shadow: Shadow,
	changes: u64,
	value: Value,
	very_old: Value,
	first_run: bool,
}

impl CollectionState {
	/// Diffs `value` against the shadow and bumps `changes` for every
	/// difference found.
	fn observe(&mut self, value: Value) {
		match classify(&value) {
			Shape::ArrayLike(items) => {
				if !matches!(self.shadow, Shadow::Array(_)) {
					self.changes += 1;
					self.shadow = Shadow::Array(Vec::new());
				}
				let Shadow::Array(old) = &mut self.shadow else {
					unreachable!()
				};
				if old.len() != items.len() {
					self.changes += 1;
					old.resize(items.len(), Value::Undefined);
				}
				for (old, new) in old.iter_mut().zip(items) {
					if !old.same(&new) {
						self.changes += 1;
						*old = new;
					}
				}
			}
			Shape::Keyed(object) => {
				if !matches!(self.shadow, Shadow::Map(_)) {
					self.changes += 1;
					self.shadow = Shadow::Map(FxHashMap::default());
				}
				let Shadow::Map(old) = &mut self.shadow else {
					unreachable!()
				};
				let entries = object.borrow();
				for (key, new) in entries.iter() {
					match old.get_mut(key) {
						Some(old) if old.same(new) => {}
						Some(old) => {
							self.changes += 1;
							*old = new.clone();
						}
						None => {
							self.changes += 1;
							old.insert(key.clone(), new.clone());
						}
					}
				}
				if old.len() > entries.len() {
					self.changes += 1;
					old.retain(|key, _| entries.contains_key(key));
				}
			}
			Shape::Scalar => {
				if !matches!(&self.shadow, Shadow::Scalar(old) if old.same(&value)) {
					self.changes += 1;
				}
				self.shadow = Shadow::Scalar(value.clone());
			}
		}
		self.value = value;
	}
}

impl Scope {
	/// Watches the shallow contents of an array, array-like or object:
	/// additions, removals, replacements and reordering fire the listener,
	/// changes deeper down do not.
	///
	/// The listener receives the live value and a shallow copy of the value
	/// it saw last time (the live value itself on the first call).
	pub fn watch_collection<W, L>(&self, watch_fn: W, listener: L) -> Deregistration
	where
		W: Fn(&Scope) -> Value + 'static,
		L: Fn(&Value, &Value, &Scope) + 'static,
	{
		let state = Rc::new(RefCell::new(CollectionState {
			shadow: Shadow::Scalar(Value::Undefined),
			changes: 0,
			value: Value::Undefined,
			very_old: Value::Undefined,
			first_run: true,
		}));

		let counter = {
			let state = state.clone();
			move |scope: &Scope| {
				let value = watch_fn(scope);
				let mut state = state.borrow_mut();
				state.observe(value);
				Value::Number(state.changes as f64)
			}
		};

		self.watch(counter, move |_, _, scope| {
			let (value, very_old, first_run) = {
				let mut state = state.borrow_mut();
				let first_run = std::mem::replace(&mut state.first_run, false);
				(state.value.clone(), state.very_old.clone(), first_run)
			};

			if first_run {
				listener(&value, &value, scope);
			} else {
				listener(&value, &very_old, scope);
			}

			state.borrow_mut().very_old = value.shallow_copy();
		})
	}
}
