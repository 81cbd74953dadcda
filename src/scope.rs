use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::config::RootOptions;
use crate::event::EventListener;
use crate::timer::Scheduler;
use crate::tree::Tree;
use crate::watcher::Watcher;
use crate::{Phase, Value};

/// Event fired down a subtree right before it is torn down.
pub const DESTROY_EVENT: &str = "$destroy";

/// A node of the observable tree.
///
/// `Scope` is a cheap handle; clones refer to the same node. Parents and
/// the root are held weakly, so the host keeps the root alive.
#[derive(Clone)]
pub struct Scope {
	pub(crate) body: Rc<ScopeBody>,
}

pub(crate) struct ScopeBody {
	pub(crate) tree: Rc<Tree>,
	pub(crate) inner: RefCell<ScopeInner>,
	isolated: bool,
}

pub(crate) struct ScopeInner {
	attrs: FxHashMap<String, Value>,
	/// Where attribute reads fall through to. `None` for roots and isolated
	/// scopes.
	proto: Option<Weak<ScopeBody>>,
	/// Owner of our slot in a child list.
	parent: Option<Weak<ScopeBody>>,
	children: Vec<Scope>,
	/// Oldest first. `None` once the scope is destroyed.
	pub(crate) watchers: Option<Vec<Rc<Watcher>>>,
	pub(crate) listeners: FxHashMap<String, SmallVec<[Option<EventListener>; 2]>>,
}

impl ScopeInner {
	fn new(proto: Option<Weak<ScopeBody>>, parent: Option<Weak<ScopeBody>>) -> Self {
		ScopeInner {
			attrs: FxHashMap::default(),
			proto,
			parent,
			children: Vec::new(),
			watchers: Some(Vec::new()),
			listeners: FxHashMap::default(),
		}
	}
}

impl Default for Scope {
	fn default() -> Self {
		Scope::new()
	}
}

impl Scope {
	/// Creates a root scope with default options.
	pub fn new() -> Self {
		Self::with_options(RootOptions::default())
	}

	pub fn with_scheduler(scheduler: Rc<dyn Scheduler>) -> Self {
		Self::with_options(RootOptions::default().scheduler(scheduler))
	}

	pub fn with_options(options: RootOptions) -> Self {
		let body = Rc::new_cyclic(|this: &Weak<ScopeBody>| ScopeBody {
			tree: Rc::new(Tree::new(this.clone(), options)),
			inner: RefCell::new(ScopeInner::new(None, None)),
			isolated: false,
		});
		tracing::debug!("root scope created");
		Scope { body }
	}

	pub(crate) fn from_body(body: Rc<ScopeBody>) -> Self {
		Scope { body }
	}

	pub(crate) fn tree(&self) -> &Rc<Tree> {
		&self.body.tree
	}

	/// Child that reads through to this scope's attributes.
	pub fn new_child(&self) -> Scope {
		self.new_child_of(false, self)
	}

	/// Child with private attributes that still shares the digest tree and
	/// task queues.
	pub fn new_isolated(&self) -> Scope {
		self.new_child_of(true, self)
	}

	/// Creates a child whose attribute lookup (unless `isolated`) delegates
	/// to `self` while `parent` owns it in the hierarchy: `parent` digests,
	/// broadcasts to and destroys it, and lends it its task queues.
	///
	/// Under a destroyed `parent` the child comes back detached and already
	/// destroyed.
	pub fn new_child_of(&self, isolated: bool, parent: &Scope) -> Scope {
		let proto = (!isolated).then(|| Rc::downgrade(&self.body));
		let child = Scope {
			body: Rc::new(ScopeBody {
				tree: parent.body.tree.clone(),
				inner: RefCell::new(ScopeInner::new(proto, Some(Rc::downgrade(&parent.body)))),
				isolated,
			}),
		};

		let mut inner = parent.body.inner.borrow_mut();
		if inner.watchers.is_none() {
			tracing::warn!("child created under a destroyed scope, detaching");
			let mut detached = child.body.inner.borrow_mut();
			detached.parent = None;
			detached.watchers = None;
			drop(detached);
			return child;
		}
		inner.children.push(child.clone());
		tracing::debug!(isolated, "child scope created");

		child
	}

	/// Broadcasts [`DESTROY_EVENT`] through the subtree, then detaches this
	/// scope from its parent and drops its watchers and listeners.
	pub fn destroy(&self) {
		if self.is_destroyed() {
			return;
		}

		self.broadcast(DESTROY_EVENT, &[]);

		let parent = self.body.inner.borrow_mut().parent.take();
		if let Some(parent) = parent.and_then(|p| p.upgrade()) {
			parent
				.inner
				.borrow_mut()
				.children
				.retain(|child| !Rc::ptr_eq(&child.body, &self.body));
		}

		let mut inner = self.body.inner.borrow_mut();
		// A sweep may still hold a snapshot of these.
		for watcher in inner.watchers.take().into_iter().flatten() {
			watcher.mark_removed();
		}
		inner.listeners.clear();
		tracing::debug!("scope destroyed");
	}

	pub fn is_destroyed(&self) -> bool {
		self.body.inner.borrow().watchers.is_none()
	}

	pub fn is_isolated(&self) -> bool {
		self.body.isolated
	}

	pub fn parent(&self) -> Option<Scope> {
		let inner = self.body.inner.borrow();
		inner.parent.as_ref()?.upgrade().map(Scope::from_body)
	}

	/// Falls back to `self` if the root has already been dropped.
	pub fn root(&self) -> Scope {
		self.body.tree.root().unwrap_or_else(|| self.clone())
	}

	pub fn children(&self) -> Vec<Scope> {
		self.body.inner.borrow().children.clone()
	}

	pub fn phase(&self) -> Option<Phase> {
		self.body.tree.phase()
	}

	pub fn scheduler(&self) -> Rc<dyn Scheduler> {
		self.body.tree.scheduler.clone()
	}

	/// Runs the tree's pending deferred tasks: scheduled digests and
	/// apply-async flushes. With the default native scheduler nothing runs
	/// until this is called.
	pub fn run_pending_timers(&self) -> usize {
		let scheduler = self.scheduler();
		scheduler.run_pending()
	}

	pub fn ptr_eq(&self, other: &Scope) -> bool {
		Rc::ptr_eq(&self.body, &other.body)
	}

	/// Reads an attribute, walking up the delegation chain. Missing
	/// attributes read as `Undefined`.
	pub fn get(&self, key: &str) -> Value {
		let mut body = self.body.clone();
		loop {
			let next = {
				let inner = body.inner.borrow();
				if let Some(value) = inner.attrs.get(key) {
					return value.clone();
				}
				inner.proto.as_ref().and_then(Weak::upgrade)
			};
			match next {
				Some(proto) => body = proto,
				None => return Value::Undefined,
			}
		}
	}

	/// Always writes an own attribute, shadowing any inherited one.
	pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
		self.body
			.inner
			.borrow_mut()
			.attrs
			.insert(key.into(), value.into());
	}

	pub fn has_own(&self, key: &str) -> bool {
		self.body.inner.borrow().attrs.contains_key(key)
	}

	/// Removes an own attribute, uncovering the inherited one if any.
	pub fn remove(&self, key: &str) -> Option<Value> {
		self.body.inner.borrow_mut().attrs.remove(key)
	}

	/// Pre-order walk of this scope and its descendants. Stops as soon as
	/// `func` returns `false` and reports whether the walk completed.
	pub(crate) fn every_scope(&self, func: &mut dyn FnMut(&Scope) -> bool) -> bool {
		if !func(self) {
			return false;
		}
		for child in self.children() {
			if !child.every_scope(func) {
				return false;
			}
		}
		true
	}
}

impl PartialEq for Scope {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl Eq for Scope {}

impl Debug for Scope {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.body.inner.borrow();
		f.debug_struct("Scope")
			.field("isolated", &self.body.isolated)
			.field("destroyed", &inner.watchers.is_none())
			.field("children", &inner.children.len())
			.finish()
	}
}
