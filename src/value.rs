use std::cell::{Ref, RefCell};
use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use fxhash::{FxHashMap, FxHasher};

/// Dynamic model value held in scope attributes and returned by watch
/// functions.
///
/// `Array` and `Object` are shared handles: cloning the value clones the
/// handle, not the contents, so a watcher comparing by reference sees
/// in-place mutation as "no change".
#[derive(Clone, Default)]
pub enum Value {
	#[default]
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	String(Rc<str>),
	Array(Array),
	Object(Object),
}

#[derive(Clone, Default)]
pub struct Array {
	items: Rc<RefCell<Vec<Value>>>,
}

#[derive(Clone, Default)]
pub struct Object {
	entries: Rc<RefCell<FxHashMap<String, Value>>>,
}

impl Value {
	pub fn array<I, V>(items: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		Value::Array(Array::from_vec(items.into_iter().map(Into::into).collect()))
	}

	pub fn object<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<Value>,
	{
		let object = Object::new();
		for (key, value) in entries {
			object.insert(key, value);
		}
		Value::Object(object)
	}

	pub fn is_undefined(&self) -> bool {
		matches!(self, Value::Undefined)
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&Array> {
		match self {
			Value::Array(array) => Some(array),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&Object> {
		match self {
			Value::Object(object) => Some(object),
			_ => None,
		}
	}

	/// Reference equality: containers are equal only when they are the same
	/// container. Two NaNs are considered equal.
	pub fn same(&self, other: &Value) -> bool {
		match (self, other) {
			(Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
			(Value::String(a), Value::String(b)) => a == b,
			(Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
			(Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
			_ => false,
		}
	}

	/// Structural equality. Key order of objects is irrelevant. Cyclic
	/// values are equal when their cycles close at the same depth.
	pub fn deep_eq(&self, other: &Value) -> bool {
		self.deep_eq_in(other, &mut Vec::new())
	}

	/// `path` holds the container pairs currently being compared.
	fn deep_eq_in(&self, other: &Value, path: &mut Vec<(usize, usize)>) -> bool {
		let pair = match (self, other) {
			(Value::Array(a), Value::Array(b)) => (a.addr(), b.addr()),
			(Value::Object(a), Value::Object(b)) => (a.addr(), b.addr()),
			_ => return self.same(other),
		};
		let left = path.iter().position(|&(a, _)| a == pair.0);
		let right = path.iter().position(|&(_, b)| b == pair.1);
		if left.is_some() || right.is_some() {
			return left == right;
		}

		path.push(pair);
		let equal = match (self, other) {
			(Value::Array(a), Value::Array(b)) => {
				let (a, b) = (a.items.borrow(), b.items.borrow());
				a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq_in(y, path))
			}
			(Value::Object(a), Value::Object(b)) => {
				let (a, b) = (a.entries.borrow(), b.entries.borrow());
				a.len() == b.len()
					&& a.iter()
						.all(|(key, x)| b.get(key).map_or(false, |y| x.deep_eq_in(y, path)))
			}
			_ => unreachable!(),
		};
		path.pop();
		equal
	}

	/// Recursive copy into fresh containers. Cycles are reproduced in the
	/// copy instead of being followed forever.
	pub fn deep_copy(&self) -> Value {
		self.deep_copy_in(&mut FxHashMap::default())
	}

	fn deep_copy_in(&self, copies: &mut FxHashMap<usize, Value>) -> Value {
		match self {
			Value::Array(array) => {
				if let Some(copy) = copies.get(&array.addr()) {
					return copy.clone();
				}
				let copy = Array::new();
				copies.insert(array.addr(), Value::Array(copy.clone()));
				let items = array
					.items
					.borrow()
					.iter()
					.map(|item| item.deep_copy_in(copies))
					.collect();
				*copy.items.borrow_mut() = items;
				Value::Array(copy)
			}
			Value::Object(object) => {
				if let Some(copy) = copies.get(&object.addr()) {
					return copy.clone();
				}
				let copy = Object::new();
				copies.insert(object.addr(), Value::Object(copy.clone()));
				let entries = object
					.entries
					.borrow()
					.iter()
					.map(|(key, value)| (key.clone(), value.deep_copy_in(copies)))
					.collect();
				*copy.entries.borrow_mut() = entries;
				Value::Object(copy)
			}
			other => other.clone(),
		}
	}

	/// One-level copy: a new container holding the same children.
	pub fn shallow_copy(&self) -> Value {
		match self {
			Value::Array(array) => Value::Array(Array::from_vec(array.to_vec())),
			Value::Object(object) => Value::Object(Object::from_map(object.entries.borrow().clone())),
			other => other.clone(),
		}
	}
}

impl Array {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_vec(items: Vec<Value>) -> Self {
		Array {
			items: Rc::new(RefCell::new(items)),
		}
	}

	pub fn len(&self) -> usize {
		self.items.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.borrow().is_empty()
	}

	/// Returns `Undefined` for an index past the end.
	pub fn get(&self, index: usize) -> Value {
		self.items.borrow().get(index).cloned().unwrap_or_default()
	}

	/// Writing past the end pads the gap with `Undefined`.
	pub fn set(&self, index: usize, value: impl Into<Value>) {
		let mut items = self.items.borrow_mut();
		if index >= items.len() {
			items.resize(index + 1, Value::Undefined);
		}
		items[index] = value.into();
	}

	pub fn push(&self, value: impl Into<Value>) {
		self.items.borrow_mut().push(value.into());
	}

	pub fn pop(&self) -> Option<Value> {
		self.items.borrow_mut().pop()
	}

	pub fn insert(&self, index: usize, value: impl Into<Value>) {
		self.items.borrow_mut().insert(index, value.into());
	}

	pub fn remove(&self, index: usize) -> Option<Value> {
		let mut items = self.items.borrow_mut();
		(index < items.len()).then(|| items.remove(index))
	}

	pub fn truncate(&self, len: usize) {
		self.items.borrow_mut().truncate(len);
	}

	pub fn reverse(&self) {
		self.items.borrow_mut().reverse();
	}

	pub fn to_vec(&self) -> Vec<Value> {
		self.items.borrow().clone()
	}

	pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
		self.items.borrow()
	}

	pub fn ptr_eq(&self, other: &Array) -> bool {
		Rc::ptr_eq(&self.items, &other.items)
	}

	fn addr(&self) -> usize {
		Rc::as_ptr(&self.items) as usize
	}
}

impl Object {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_map(entries: FxHashMap<String, Value>) -> Self {
		Object {
			entries: Rc::new(RefCell::new(entries)),
		}
	}

	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.borrow().is_empty()
	}

	pub fn get(&self, key: &str) -> Value {
		self.entries.borrow().get(key).cloned().unwrap_or_default()
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.entries.borrow().contains_key(key)
	}

	pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.entries.borrow_mut().insert(key.into(), value.into())
	}

	pub fn remove(&self, key: &str) -> Option<Value> {
		self.entries.borrow_mut().remove(key)
	}

	pub fn keys(&self) -> Vec<String> {
		self.entries.borrow().keys().cloned().collect()
	}

	pub fn borrow(&self) -> Ref<'_, FxHashMap<String, Value>> {
		self.entries.borrow()
	}

	pub fn ptr_eq(&self, other: &Object) -> bool {
		Rc::ptr_eq(&self.entries, &other.entries)
	}

	fn addr(&self) -> usize {
		Rc::as_ptr(&self.entries) as usize
	}
}

/// Hashes content, consistent with [`Value::deep_eq`].
impl Hash for Value {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.hash_in(state, &mut Vec::new());
	}
}

impl Value {
	/// A container already on `path` hashes as a back reference to its
	/// position there, the same rule [`Value::deep_eq`] compares cycles by.
	fn hash_in<H: Hasher>(&self, state: &mut H, path: &mut Vec<usize>) {
		let addr = match self {
			Value::Array(array) => Some(array.addr()),
			Value::Object(object) => Some(object.addr()),
			_ => None,
		};
		if let Some(addr) = addr {
			if let Some(depth) = path.iter().position(|&seen| seen == addr) {
				state.write_u8(7);
				state.write_usize(depth);
				return;
			}
			path.push(addr);
		}

		match self {
			Value::Undefined => state.write_u8(0),
			Value::Null => state.write_u8(1),
			Value::Bool(b) => {
				state.write_u8(2);
				b.hash(state);
			}
			Value::Number(n) => {
				state.write_u8(3);
				let bits = if n.is_nan() {
					f64::NAN.to_bits()
				} else if *n == 0.0 {
					0
				} else {
					n.to_bits()
				};
				state.write_u64(bits);
			}
			Value::String(s) => {
				state.write_u8(4);
				s.hash(state);
			}
			Value::Array(array) => {
				state.write_u8(5);
				let items = array.items.borrow();
				state.write_usize(items.len());
				for item in items.iter() {
					item.hash_in(state, path);
				}
			}
			Value::Object(object) => {
				state.write_u8(6);
				let entries = object.entries.borrow();
				state.write_usize(entries.len());
				// Order independent, map iteration order is unspecified.
				let combined = entries.iter().fold(0u64, |acc, (key, value)| {
					let mut hasher = FxHasher::default();
					key.hash(&mut hasher);
					value.hash_in(&mut hasher, path);
					acc.wrapping_add(hasher.finish())
				});
				state.write_u64(combined);
			}
		}

		if addr.is_some() {
			path.pop();
		}
	}

	fn render(&self, f: &mut std::fmt::Formatter<'_>, path: &mut Vec<usize>) -> std::fmt::Result {
		match self {
			Value::Undefined => f.write_str("undefined"),
			Value::Null => f.write_str("null"),
			Value::Bool(b) => write!(f, "{}", b),
			Value::Number(n) if n.is_nan() => f.write_str("NaN"),
			Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
			Value::Number(n) => write!(f, "{}", n),
			Value::String(s) => write!(f, "{:?}", s),
			Value::Array(array) => {
				if path.contains(&array.addr()) {
					return f.write_str("[Circular]");
				}
				path.push(array.addr());
				f.write_str("[")?;
				for (i, item) in array.items.borrow().iter().enumerate() {
					if i > 0 {
						f.write_str(",")?;
					}
					item.render(f, path)?;
				}
				path.pop();
				f.write_str("]")
			}
			Value::Object(object) => {
				if path.contains(&object.addr()) {
					return f.write_str("[Circular]");
				}
				path.push(object.addr());
				let entries = object.entries.borrow();
				let mut keys: Vec<&String> = entries.keys().collect();
				keys.sort();
				f.write_str("{")?;
				for (i, key) in keys.into_iter().enumerate() {
					if i > 0 {
						f.write_str(",")?;
					}
					write!(f, "{:?}:", key)?;
					entries[key].render(f, path)?;
				}
				path.pop();
				f.write_str("}")
			}
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.render(f, &mut Vec::new())
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}

impl Debug for Array {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&Value::Array(self.clone()), f)
	}
}

impl Debug for Object {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&Value::Object(self.clone()), f)
	}
}

impl From<f64> for Value {
	fn from(n: f64) -> Self {
		Value::Number(n)
	}
}

impl From<i32> for Value {
	fn from(n: i32) -> Self {
		Value::Number(n as f64)
	}
}

impl From<u32> for Value {
	fn from(n: u32) -> Self {
		Value::Number(n as f64)
	}
}

impl From<usize> for Value {
	fn from(n: usize) -> Self {
		Value::Number(n as f64)
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.into())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::String(s.into())
	}
}

impl From<Vec<Value>> for Value {
	fn from(items: Vec<Value>) -> Self {
		Value::Array(Array::from_vec(items))
	}
}

impl From<Array> for Value {
	fn from(array: Array) -> Self {
		Value::Array(array)
	}
}

impl From<Object> for Value {
	fn from(object: Object) -> Self {
		Value::Object(object)
	}
}

impl From<()> for Value {
	fn from(_: ()) -> Self {
		Value::Undefined
	}
}
