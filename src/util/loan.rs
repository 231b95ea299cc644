//! A static slot for handing hardware from thread code to an interrupt handler.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// Holds at most one `T` on loan to an ISR.
///
/// Thread code fills the slot with `lend` before unmasking the interrupt; the
/// handler then `borrow`s it on every entry. Neither side ever waits: the
/// handler can't, so finding the slot busy is reported instead.
#[derive(Debug)]
pub struct Loan<T> {
    busy: AtomicBool,
    slot: UnsafeCell<Option<T>>,
}

unsafe impl<T: Send> Sync for Loan<T> {}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoanError {
    /// Another borrow is still live.
    Busy,
    /// Nothing has been lent yet.
    Empty,
}

impl<T> Loan<T> {
    pub const fn empty() -> Self {
        Loan {
            busy: AtomicBool::new(false),
            slot: UnsafeCell::new(None),
        }
    }
}

impl<T: Send> Loan<T> {
    /// Places `value` in the slot, returning whatever was there.
    pub fn lend(&self, value: T) -> Result<Option<T>, LoanError> {
        let mut slot = self.claim()?;
        Ok(core::mem::replace(&mut *slot, Some(value)))
    }

    /// Borrows the lent value until the returned guard drops.
    pub fn borrow(&self) -> Result<Borrowed<T>, LoanError> {
        let slot = self.claim()?;
        match slot.contents {
            Some(value) => Ok(Borrowed {
                _flag: slot.flag,
                value,
            }),
            None => Err(LoanError::Empty),
        }
    }

    fn claim(&self) -> Result<Claim<T>, LoanError> {
        if self.busy.swap(true, Ordering::Acquire) {
            return Err(LoanError::Busy);
        }
        Ok(Claim {
            flag: Flag(&self.busy),
            // Safety: we took the flag from false to true, so no other
            // reference to the slot exists until `flag` drops.
            contents: unsafe { &mut *self.slot.get() },
        })
    }
}

/// Exclusive access to the slot's `Option`.
struct Claim<'a, T> {
    flag: Flag<'a>,
    contents: &'a mut Option<T>,
}

impl<'a, T> core::ops::Deref for Claim<'a, T> {
    type Target = Option<T>;
    fn deref(&self) -> &Option<T> {
        self.contents
    }
}

impl<'a, T> core::ops::DerefMut for Claim<'a, T> {
    fn deref_mut(&mut self) -> &mut Option<T> {
        self.contents
    }
}

/// Clears the busy flag on drop. Separate from the guards so they can be
/// taken apart by pattern.
#[derive(Debug)]
struct Flag<'a>(&'a AtomicBool);

impl<'a> Drop for Flag<'a> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A live borrow of the lent value.
#[must_use = "if dropped, the loan is immediately released"]
#[derive(Debug)]
pub struct Borrowed<'a, T> {
    _flag: Flag<'a>,
    value: &'a mut T,
}

impl<'a, T> core::ops::Deref for Borrowed<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.value
    }
}

impl<'a, T> core::ops::DerefMut for Borrowed<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value
    }
}
