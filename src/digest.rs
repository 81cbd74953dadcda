use crate::error::{CallbackKind, DigestError};
use crate::tree::Tree;
use crate::{Phase, Scope};

impl Scope {
	/// Runs watchers of this scope and its descendants until nothing is
	/// dirty and no eval-async work is left, then runs post-digest
	/// callbacks.
	///
	/// Ancestors are not visited. Fails if a digest or apply is already
	/// running in this tree, or if the watchers have not settled after
	/// the configured number of sweeps.
	pub fn digest(&self) -> Result<(), DigestError> {
		if self.is_destroyed() {
			tracing::warn!("digest on a destroyed scope, ignoring");
			return Ok(());
		}

		let tree = self.tree().clone();
		tree.begin_phase(Phase::Digest)?;
		tree.reset_last_dirty();

		if let Some(timer) = tree.take_apply_async_timer() {
			tree.scheduler.cancel(timer);
			tree.flush_apply_async();
		}

		let mut sweeps = 0;
		loop {
			tree.drain_async();

			let dirty = self.sweep(&tree);
			sweeps += 1;

			let busy = dirty || tree.has_async();
			tracing::trace!(sweeps, dirty, "digest sweep");

			if !busy {
				break;
			}
			if sweeps >= tree.ttl {
				tree.clear_phase();
				tracing::debug!(ttl = tree.ttl, "digest did not converge");
				return Err(DigestError::TtlExceeded { ttl: tree.ttl });
			}
		}

		tree.clear_phase();
		tree.drain_post_digest();

		Ok(())
	}

	/// One walk over the subtree. Returns whether any watcher was dirty.
	///
	/// The walk stops early when it meets the last watcher that was dirty
	/// and finds it clean: a full lap passed without changes.
	fn sweep(&self, tree: &Tree) -> bool {
		let mut dirty = false;

		self.every_scope(&mut |scope| {
			for watcher in scope.watchers_newest_first() {
				if watcher.is_removed() {
					continue;
				}

				let Some(value) = tree.guarded(CallbackKind::Watch, || watcher.evaluate(scope)) else {
					continue;
				};
				// Deregistered by its own watch function.
				if watcher.is_removed() {
					continue;
				}

				if watcher.is_dirty(&value) {
					tree.mark_dirty(&watcher);
					let old = watcher.record(&value);
					tree.guarded(CallbackKind::Listener, || watcher.notify(&value, &old, scope));
					dirty = true;
				} else if tree.is_last_dirty(&watcher) {
					return false;
				}
			}
			true
		});

		dirty
	}
}
