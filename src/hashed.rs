use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Deref;

use crate::Value;

/// A value stored together with its content hash.
pub struct Hashed<T> {
	pub value: T,
	pub hash: u64,
}

impl<T> Hashed<T> {
	pub fn new(value: T) -> Self
	where
		T: Hash,
	{
		let hash = fxhash::hash64(&value);
		Self { value, hash }
	}
}

impl Hashed<Value> {
	/// Deep-copies `value`, so later mutation of the live containers does
	/// not leak into the snapshot.
	pub fn snapshot(value: &Value) -> Self {
		Hashed::new(value.deep_copy())
	}

	/// Structural comparison against a live value. Differing hashes reject
	/// without walking both trees.
	pub fn matches(&self, value: &Value) -> bool {
		fxhash::hash64(value) == self.hash && self.value.deep_eq(value)
	}
}

impl<T> Deref for Hashed<T> {
	type Target = T;
	fn deref(&self) -> &Self::Target {
		&self.value
	}
}

impl<T> Debug for Hashed<T>
where
	T: Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.value.fmt(f)
	}
}
