use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::error::{CallbackResult, DigestError};
use crate::{Phase, Scope};

impl Scope {
	/// Calls `func` with this scope. No phase or queue is involved.
	pub fn eval<R>(&self, func: impl FnOnce(&Scope) -> R) -> R {
		func(self)
	}

	/// Runs `func` in the apply phase, then digests from the root.
	///
	/// The phase is cleared and the root digested even if `func` panics;
	/// the panic is resumed afterwards.
	pub fn apply<R>(&self, func: impl FnOnce(&Scope) -> R) -> Result<R, DigestError> {
		let tree = self.tree().clone();
		tree.begin_phase(Phase::Apply)?;

		let result = panic::catch_unwind(AssertUnwindSafe(|| self.eval(func)));
		tree.clear_phase();
		let digested = self.root().digest();

		match result {
			Ok(value) => digested.map(|_| value),
			Err(payload) => panic::resume_unwind(payload),
		}
	}

	/// Queues `func` to run against this scope inside the current digest,
	/// or inside one scheduled for it if no digest is running.
	pub fn eval_async(&self, func: impl FnOnce(&Scope) + 'static) {
		self.try_eval_async(move |scope| {
			func(scope);
			Ok(())
		})
	}

	/// [`Scope::eval_async`] for a task that can fail. An `Err` goes to the
	/// exception handler.
	pub fn try_eval_async(&self, func: impl FnOnce(&Scope) -> CallbackResult + 'static) {
		if self.is_destroyed() {
			tracing::warn!("eval_async on a destroyed scope, ignoring");
			return;
		}

		let tree = self.tree();
		let idle = tree.phase().is_none();
		let was_empty = tree.push_async(Rc::downgrade(&self.body), Box::new(func));

		if idle && was_empty {
			let root = tree.root_weak();
			tree.scheduler.defer(Box::new(move || {
				let Some(root) = root.upgrade().map(Scope::from_body) else {
					return;
				};
				// A digest may already have drained the queue.
				if root.tree().has_async() {
					if let Err(err) = root.digest() {
						tracing::error!(%err, "scheduled digest failed");
					}
				}
			}));
			tracing::debug!("digest scheduled for eval_async");
		}
	}

	/// Queues `func` for a coalesced apply. Calls made before the scheduled
	/// flush share one digest; a digest that runs first flushes the queue
	/// itself and cancels the flush.
	pub fn apply_async(&self, func: impl FnOnce(&Scope) + 'static) {
		self.try_apply_async(move |scope| {
			func(scope);
			Ok(())
		})
	}

	/// [`Scope::apply_async`] for a task that can fail.
	pub fn try_apply_async(&self, func: impl FnOnce(&Scope) -> CallbackResult + 'static) {
		if self.is_destroyed() {
			tracing::warn!("apply_async on a destroyed scope, ignoring");
			return;
		}

		let tree = self.tree();
		let scope = Rc::downgrade(&self.body);
		tree.push_apply_async(Box::new(move || {
			match scope.upgrade().map(Scope::from_body) {
				Some(scope) => scope.eval(func),
				None => Ok(()),
			}
		}));

		if !tree.apply_async_armed() {
			let root = tree.root_weak();
			let id = tree.scheduler.defer(Box::new(move || {
				let Some(root) = root.upgrade().map(Scope::from_body) else {
					return;
				};
				let tree = root.tree().clone();
				if let Err(err) = root.apply(|_| tree.flush_apply_async()) {
					tracing::error!(%err, "scheduled apply failed");
				}
			}));
			tree.arm_apply_async(id);
			tracing::debug!("apply_async flush scheduled");
		}
	}

	/// Runs `func` once, after the next digest settles.
	pub fn post_digest(&self, func: impl FnOnce() + 'static) {
		self.try_post_digest(move || {
			func();
			Ok(())
		})
	}

	/// [`Scope::post_digest`] for a callback that can fail.
	pub fn try_post_digest(&self, func: impl FnOnce() -> CallbackResult + 'static) {
		if self.is_destroyed() {
			tracing::warn!("post_digest on a destroyed scope, ignoring");
			return;
		}
		self.tree().push_post_digest(Box::new(func));
	}
}
