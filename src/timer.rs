use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// Identifies a deferred task so it can be cancelled before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Host-provided single-shot deferral. Tasks run later, on the same thread,
/// outside whatever call deferred them.
pub trait Scheduler {
	fn defer(&self, task: Box<dyn FnOnce()>) -> TimerId;

	/// Cancelling a task that already ran (or never existed) is a no-op.
	fn cancel(&self, id: TimerId);

	/// Runs whatever is still pending and returns how many tasks ran.
	/// Schedulers driven by a host event loop have nothing to run here.
	fn run_pending(&self) -> usize {
		0
	}
}

/// Scheduler driven explicitly by the host: nothing runs until
/// [`ManualScheduler::run_next`] or [`ManualScheduler::flush`] is called.
#[derive(Default)]
pub struct ManualScheduler {
	next_id: Cell<u64>,
	pending: RefCell<VecDeque<(TimerId, Box<dyn FnOnce()>)>>,
}

impl ManualScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn pending(&self) -> usize {
		self.pending.borrow().len()
	}

	/// Runs the oldest pending task. Returns `false` when nothing was queued.
	pub fn run_next(&self) -> bool {
		let task = self.pending.borrow_mut().pop_front();
		match task {
			Some((_, task)) => {
				task();
				true
			}
			None => false,
		}
	}

	/// Runs tasks until the queue is empty, including tasks deferred by the
	/// tasks themselves. Returns how many ran.
	pub fn flush(&self) -> usize {
		let mut count = 0;
		while self.run_next() {
			count += 1;
		}
		count
	}
}

impl Scheduler for ManualScheduler {
	fn defer(&self, task: Box<dyn FnOnce()>) -> TimerId {
		let id = TimerId(self.next_id.get());
		self.next_id.set(id.0 + 1);
		self.pending.borrow_mut().push_back((id, task));
		id
	}

	fn cancel(&self, id: TimerId) {
		self.pending.borrow_mut().retain(|(pending, _)| *pending != id);
	}

	fn run_pending(&self) -> usize {
		self.flush()
	}
}

#[cfg(target_arch = "wasm32")]
pub use microtask::MicrotaskScheduler;

#[cfg(target_arch = "wasm32")]
mod microtask {
	use std::cell::{Cell, RefCell};
	use std::rc::Rc;

	use fxhash::FxHashMap;
	use wasm_bindgen::prelude::*;

	use super::{Scheduler, TimerId};

	#[wasm_bindgen]
	extern "C" {
		#[wasm_bindgen(js_name = queueMicrotask)]
		fn queue_microtask(closure: &JsValue);
	}

	/// Defers through the host's `queueMicrotask`.
	#[derive(Default)]
	pub struct MicrotaskScheduler {
		next_id: Cell<u64>,
		live: Rc<RefCell<FxHashMap<TimerId, Rc<Cell<bool>>>>>,
	}

	impl MicrotaskScheduler {
		pub fn new() -> Self {
			Self::default()
		}
	}

	impl Scheduler for MicrotaskScheduler {
		fn defer(&self, task: Box<dyn FnOnce()>) -> TimerId {
			let id = TimerId(self.next_id.get());
			self.next_id.set(id.0 + 1);

			let cancelled = Rc::new(Cell::new(false));
			self.live.borrow_mut().insert(id, cancelled.clone());

			let live = self.live.clone();
			queue_microtask(&Closure::once_into_js(move || {
				live.borrow_mut().remove(&id);
				if !cancelled.get() {
					task();
				}
			}));

			id
		}

		fn cancel(&self, id: TimerId) {
			if let Some(flag) = self.live.borrow_mut().remove(&id) {
				flag.set(true);
			}
		}
	}
}
