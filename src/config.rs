use std::rc::Rc;

use crate::error::{ExceptionHandler, TracingExceptionHandler};
use crate::timer::Scheduler;

/// Digest iteration budget used when none is configured.
pub const DEFAULT_TTL: usize = 10;

/// Settings fixed when a root scope is created and shared by its whole tree.
#[derive(Clone)]
pub struct RootOptions {
	pub(crate) ttl: usize,
	pub(crate) scheduler: Rc<dyn Scheduler>,
	pub(crate) exception_handler: Rc<dyn ExceptionHandler>,
}

impl Default for RootOptions {
	fn default() -> Self {
		RootOptions {
			ttl: DEFAULT_TTL,
			scheduler: default_scheduler(),
			exception_handler: Rc::new(TracingExceptionHandler),
		}
	}
}

impl RootOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Maximum number of sweeps a single digest may run. At least one.
	pub fn ttl(mut self, ttl: usize) -> Self {
		self.ttl = ttl.max(1);
		self
	}

	pub fn scheduler(mut self, scheduler: Rc<dyn Scheduler>) -> Self {
		self.scheduler = scheduler;
		self
	}

	pub fn exception_handler(mut self, handler: Rc<dyn ExceptionHandler>) -> Self {
		self.exception_handler = handler;
		self
	}
}

#[cfg(target_arch = "wasm32")]
fn default_scheduler() -> Rc<dyn Scheduler> {
	Rc::new(crate::timer::MicrotaskScheduler::new())
}

#[cfg(not(target_arch = "wasm32"))]
fn default_scheduler() -> Rc<dyn Scheduler> {
	Rc::new(crate::timer::ManualScheduler::new())
}
