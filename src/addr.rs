use std::rc::{Rc, Weak};

/// Weak pointer compared by address, so a marker can name a node without
/// keeping it alive.
pub(crate) struct WeakAddr<T: ?Sized> {
	ptr: Weak<T>,
}

impl<T: ?Sized> WeakAddr<T> {
	pub fn of(rc: &Rc<T>) -> Self {
		WeakAddr {
			ptr: Rc::downgrade(rc),
		}
	}

	pub fn points_to(&self, rc: &Rc<T>) -> bool {
		std::ptr::addr_eq(Weak::as_ptr(&self.ptr), Rc::as_ptr(rc))
	}
}
