mod mem;
pub use mem::*;
mod fifo;
pub use fifo::Fifo;

use core::alloc::Layout;

/// Types for which the all-zeroes bit pattern is a valid value.
///
/// # Safety
/// `Self` must be valid when its backing allocation is zero-filled.
pub unsafe trait Zero {}

unsafe impl Zero for u8 {}
unsafe impl Zero for u16 {}
unsafe impl Zero for u32 {}
unsafe impl Zero for u64 {}
unsafe impl<T: Zero, const LEN: usize> Zero for [T; LEN] {}
unsafe impl<T> Zero for *mut T {}
unsafe impl<T> Zero for *const T {}

pub fn zeroed_box<T: Zero>() -> Box<T> {
    unsafe {
        let layout = Layout::new::<T>();
        if layout.size() == 0 {
            return Box::from_raw(core::ptr::NonNull::<T>::dangling().as_ptr());
        }
        let ptr = std::alloc::alloc_zeroed(layout).cast::<T>();
        if ptr.is_null() {
            std::alloc::handle_alloc_error(layout);
        }
        Box::from_raw(ptr)
    }
}

#[cfg(feature = "log")]
#[macro_use]
pub mod log {
    pub use slog::{error, info, warn, Logger};
}
