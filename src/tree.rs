use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::addr::WeakAddr;
use crate::config::RootOptions;
use crate::error::{guarded, CallbackKind, CallbackResult, ExceptionHandler};
use crate::scope::{Scope, ScopeBody};
use crate::timer::{Scheduler, TimerId};
use crate::watcher::Watcher;
use crate::Phase;

pub(crate) type AsyncFn = Box<dyn FnOnce(&Scope) -> CallbackResult>;
pub(crate) type TaskFn = Box<dyn FnOnce() -> CallbackResult>;

pub(crate) struct AsyncTask {
	scope: Weak<ScopeBody>,
	func: AsyncFn,
}

/// State owned by a root and shared, by reference, with every scope of its
/// tree (isolated children included).
pub(crate) struct Tree {
	root: Weak<ScopeBody>,
	pub(crate) phase: Cell<Option<Phase>>,
	last_dirty: RefCell<Option<WeakAddr<Watcher>>>,
	async_queue: RefCell<VecDeque<AsyncTask>>,
	apply_async_queue: RefCell<VecDeque<TaskFn>>,
	apply_async_timer: Cell<Option<TimerId>>,
	post_digest_queue: RefCell<VecDeque<TaskFn>>,
	pub(crate) ttl: usize,
	pub(crate) scheduler: Rc<dyn Scheduler>,
	exception_handler: Rc<dyn ExceptionHandler>,
}

impl Tree {
	pub fn new(root: Weak<ScopeBody>, options: RootOptions) -> Self {
		Tree {
			root,
			phase: Cell::new(None),
			last_dirty: RefCell::new(None),
			async_queue: RefCell::new(VecDeque::new()),
			apply_async_queue: RefCell::new(VecDeque::new()),
			apply_async_timer: Cell::new(None),
			post_digest_queue: RefCell::new(VecDeque::new()),
			ttl: options.ttl,
			scheduler: options.scheduler,
			exception_handler: options.exception_handler,
		}
	}

	pub fn root(&self) -> Option<Scope> {
		self.root.upgrade().map(Scope::from_body)
	}

	pub fn root_weak(&self) -> Weak<ScopeBody> {
		self.root.clone()
	}

	pub fn guarded<R>(&self, kind: CallbackKind, func: impl FnOnce() -> CallbackResult<R>) -> Option<R> {
		guarded(&*self.exception_handler, kind, func)
	}

	pub fn reset_last_dirty(&self) {
		*self.last_dirty.borrow_mut() = None;
	}

	pub fn mark_dirty(&self, watcher: &Rc<Watcher>) {
		*self.last_dirty.borrow_mut() = Some(WeakAddr::of(watcher));
	}

	pub fn is_last_dirty(&self, watcher: &Rc<Watcher>) -> bool {
		self.last_dirty
			.borrow()
			.as_ref()
			.map_or(false, |last| last.points_to(watcher))
	}

	pub fn has_async(&self) -> bool {
		!self.async_queue.borrow().is_empty()
	}

	/// Returns whether the queue was empty before the push.
	pub fn push_async(&self, scope: Weak<ScopeBody>, func: AsyncFn) -> bool {
		let mut queue = self.async_queue.borrow_mut();
		let was_empty = queue.is_empty();
		queue.push_back(AsyncTask { scope, func });
		was_empty
	}

	/// Runs eval-async tasks FIFO until the queue is empty, including tasks
	/// queued by the tasks themselves.
	pub fn drain_async(&self) {
		loop {
			let task = self.async_queue.borrow_mut().pop_front();
			let Some(AsyncTask { scope, func }) = task else {
				break;
			};
			if let Some(scope) = scope.upgrade().map(Scope::from_body) {
				self.guarded(CallbackKind::EvalAsync, || func(&scope));
			}
		}
	}

	pub fn push_apply_async(&self, func: TaskFn) {
		self.apply_async_queue.borrow_mut().push_back(func);
	}

	pub fn apply_async_armed(&self) -> bool {
		self.apply_async_timer.get().is_some()
	}

	pub fn arm_apply_async(&self, id: TimerId) {
		self.apply_async_timer.set(Some(id));
	}

	pub fn take_apply_async_timer(&self) -> Option<TimerId> {
		self.apply_async_timer.take()
	}

	pub fn flush_apply_async(&self) {
		loop {
			let func = self.apply_async_queue.borrow_mut().pop_front();
			let Some(func) = func else {
				break;
			};
			self.guarded(CallbackKind::ApplyAsync, func);
		}
		self.apply_async_timer.set(None);
	}

	pub fn push_post_digest(&self, func: TaskFn) {
		self.post_digest_queue.borrow_mut().push_back(func);
	}

	pub fn drain_post_digest(&self) {
		loop {
			let func = self.post_digest_queue.borrow_mut().pop_front();
			let Some(func) = func else {
				break;
			};
			self.guarded(CallbackKind::PostDigest, func);
		}
	}
}
