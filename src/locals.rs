use fxhash::FxHashMap;

use crate::{Scope, Value};

/// Extra names visible to a single evaluation, consulted before the scope.
#[derive(Debug, Clone, Default)]
pub struct Locals {
	values: FxHashMap<String, Value>,
}

impl Locals {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.insert(key, value);
		self
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.values.insert(key.into(), value.into());
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(key)
	}

	/// Resolves `key` against the locals first, then the scope chain.
	pub fn lookup(&self, scope: &Scope, key: &str) -> Value {
		match self.values.get(key) {
			Some(value) => value.clone(),
			None => scope.get(key),
		}
	}
}

impl<K, V> FromIterator<(K, V)> for Locals
where
	K: Into<String>,
	V: Into<Value>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut locals = Locals::new();
		for (key, value) in iter {
			locals.insert(key, value);
		}
		locals
	}
}

impl Scope {
	/// Like [`Scope::eval`], with an explicit set of locals.
	pub fn eval_with_locals<R>(&self, locals: &Locals, func: impl FnOnce(&Scope, &Locals) -> R) -> R {
		func(self, locals)
	}
}
