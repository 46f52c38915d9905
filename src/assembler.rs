//! Position-addressed assembly of page fragments.
//!
//! [`Assembler`] turns an unordered sequence of [`Fragment`]s into a
//! fixed-length, ordered page collection. The collection is sized from the
//! first fragment's `total` and reallocated whenever a fragment declares a
//! different `total` (a resync). Slots are overwritten by index, so
//! re-delivery is always safe. The assembler knows nothing about URLs or
//! transports and can be driven directly in tests.

use std::num::NonZeroUsize;

use thiserror::Error;
use tracing::{debug, warn};

use crate::message::{Fragment, PageRef, StreamMessage};

/// Default upper bound on the number of pages a single assembly may hold.
pub const DEFAULT_MAX_PAGES: NonZeroUsize = match NonZeroUsize::new(10_000) {
    Some(value) => value,
    None => unreachable!(),
};

/// Lifecycle of one assembly cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AssemblyState {
    /// Nothing has been received yet.
    #[default]
    Empty,
    /// A collection is allocated and more fragments may arrive.
    Filling,
    /// The sentinel was observed; the collection is final until a resync.
    Complete,
}

/// Where an accepted fragment was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Slot that was written.
    pub index: usize,
    /// Length of the collection after the write.
    pub total: usize,
    /// Whether the collection was reallocated before the write.
    pub resynced: bool,
}

/// Outcome of a successful [`Assembler::apply`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// A fragment was written into its slot.
    Stored(Placement),
    /// The sentinel was observed.
    Completed {
        /// Number of slots holding a page.
        filled: usize,
        /// Length of the collection.
        total: usize,
    },
}

/// Fragments rejected by the assembler.
///
/// Rejection never alters the collection.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    /// The fragment's index falls outside `0..total`.
    #[error("page index {index} outside 0..{total}")]
    IndexOutOfRange {
        /// Index carried by the fragment.
        index: i64,
        /// Total carried by the fragment.
        total: usize,
    },
    /// The fragment announced more pages than the configured cap.
    #[error("page total {total} exceeds limit {limit}")]
    TotalTooLarge {
        /// Total carried by the fragment.
        total: usize,
        /// Configured cap.
        limit: NonZeroUsize,
    },
}

/// Ordered page collection rebuilt from pushed fragments.
#[derive(Debug)]
pub struct Assembler {
    pages: Option<Vec<Option<PageRef>>>,
    complete: bool,
    rearmed: bool,
    max_pages: NonZeroUsize,
}

impl Default for Assembler {
    fn default() -> Self { Self::new(DEFAULT_MAX_PAGES) }
}

impl Assembler {
    /// Create an empty assembler refusing totals above `max_pages`.
    #[must_use]
    pub fn new(max_pages: NonZeroUsize) -> Self {
        Self {
            pages: None,
            complete: false,
            rearmed: false,
            max_pages,
        }
    }

    /// Apply a decoded stream message.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] when a fragment is rejected; the collection
    /// is left exactly as it was.
    pub fn apply(&mut self, message: StreamMessage) -> Result<Applied, AssemblyError> {
        match message {
            StreamMessage::Fragment(fragment) => self.apply_fragment(fragment).map(Applied::Stored),
            StreamMessage::Sentinel => Ok(self.complete()),
        }
    }

    /// Write a fragment into its slot, resyncing first if its total differs
    /// from the current collection length.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::IndexOutOfRange`] for an index outside
    /// `0..total` and [`AssemblyError::TotalTooLarge`] when `total` exceeds
    /// the configured cap.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use pagestream::{assembler::Assembler, message::Fragment};
    ///
    /// let three = NonZeroUsize::new(3).unwrap();
    /// let mut assembler = Assembler::default();
    /// assembler.apply_fragment(Fragment::new(2, three, "p2")).unwrap();
    /// assembler.apply_fragment(Fragment::new(0, three, "p0")).unwrap();
    /// assert_eq!(assembler.filled(), 2);
    /// assert!(assembler.pages()[1].is_none());
    /// ```
    pub fn apply_fragment(&mut self, fragment: Fragment) -> Result<Placement, AssemblyError> {
        let Fragment {
            index,
            total,
            payload,
        } = fragment;
        let total = total.get();

        if total > self.max_pages.get() {
            warn!(total, limit = self.max_pages.get(), "oversized page total rejected");
            return Err(AssemblyError::TotalTooLarge {
                total,
                limit: self.max_pages,
            });
        }
        let Some(slot) = usize::try_from(index).ok().filter(|i| *i < total) else {
            warn!(index, total, "out-of-range page fragment rejected");
            return Err(AssemblyError::IndexOutOfRange { index, total });
        };

        let resynced = self.rearmed || self.len() != Some(total);
        if resynced {
            debug!(previous = ?self.len(), total, "page collection resynced");
            self.pages = Some(vec![None; total]);
            self.rearmed = false;
        }
        self.complete = false;
        if let Some(pages) = self.pages.as_mut() {
            pages[slot] = Some(payload);
        }

        Ok(Placement {
            index: slot,
            total,
            resynced,
        })
    }

    /// Record the sentinel. The collection is not modified.
    pub fn complete(&mut self) -> Applied {
        self.complete = true;
        let (filled, total) = (self.filled(), self.len().unwrap_or(0));
        debug!(filled, total, "page assembly complete");
        Applied::Completed { filled, total }
    }

    /// Force the next fragment to start a fresh collection even if its total
    /// matches the current one.
    ///
    /// The current pages stay visible until that fragment arrives.
    pub fn rearm(&mut self) { self.rearmed = true; }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AssemblyState {
        match (&self.pages, self.complete) {
            (_, true) => AssemblyState::Complete,
            (None, false) => AssemblyState::Empty,
            (Some(_), false) => AssemblyState::Filling,
        }
    }

    /// Borrow the ordered slots; empty before the first fragment.
    #[must_use]
    pub fn pages(&self) -> &[Option<PageRef>] { self.pages.as_deref().unwrap_or(&[]) }

    /// Length of the allocated collection, if any.
    #[must_use]
    pub fn len(&self) -> Option<usize> { self.pages.as_ref().map(Vec::len) }

    /// Number of slots holding a page.
    #[must_use]
    pub fn filled(&self) -> usize { self.pages().iter().filter(|p| p.is_some()).count() }

    /// Whether every slot of an allocated collection holds a page.
    #[must_use]
    pub fn is_fully_filled(&self) -> bool {
        self.pages.as_ref().is_some_and(|p| p.iter().all(Option::is_some))
    }
}
