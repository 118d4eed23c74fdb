// SPDX-License-Identifier: AGPL-3.0-only

//! Page sizing and the slice carving used to hand pages to kernels.

use serde::{Deserialize, Serialize};

use crate::error::HertzError;
use crate::Result;

/// Default pair slots per page.
pub const DEFAULT_PGSIZE: usize = 100_000;
/// Default slots reserved for one particle before it is placed.
pub const DEFAULT_ONEATOM: usize = 2_000;
/// Default upper bound on the number of pages.
pub const DEFAULT_MAX_PAGES: usize = 1_024;
/// Pages added per growth step.
pub const PGDELTA: usize = 1;

/// Sizing of the paged neighbor storage.
///
/// All sizes count neighbor pairs; the shear pages hold three doubles per
/// pair and the touch pages one flag per pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageConfig {
    pub pgsize: usize,
    pub oneatom: usize,
    pub max_pages: usize,
    pub pgdelta: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            pgsize: DEFAULT_PGSIZE,
            oneatom: DEFAULT_ONEATOM,
            max_pages: DEFAULT_MAX_PAGES,
            pgdelta: PGDELTA,
        }
    }
}

impl PageConfig {
    /// Check the sizes are usable together.
    ///
    /// # Errors
    ///
    /// `Config` if any size is zero or `oneatom > pgsize`.
    pub fn validate(&self) -> Result<()> {
        if self.pgsize == 0 || self.oneatom == 0 || self.max_pages == 0 || self.pgdelta == 0 {
            return Err(HertzError::Config(format!(
                "page sizes must be positive: {self:?}"
            )));
        }
        if self.oneatom > self.pgsize {
            return Err(HertzError::Config(format!(
                "oneatom ({}) exceeds pgsize ({})",
                self.oneatom, self.pgsize
            )));
        }
        Ok(())
    }
}

/// Location of one particle's neighbor slice, in pair units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot {
    pub page: usize,
    pub offset: usize,
    pub len: usize,
}

/// Split `pages` into one mutable slice per slot.
///
/// `slots` must be ordered by `(page, offset)` and non-overlapping, which is
/// how the builder places them. `width` is the number of `T` per pair.
pub(crate) fn carve_mut<'a, T>(
    pages: &'a mut [Vec<T>],
    slots: &[Slot],
    width: usize,
) -> Vec<&'a mut [T]> {
    debug_assert!(slots
        .windows(2)
        .all(|w| (w[0].page, w[0].offset + w[0].len) <= (w[1].page, w[1].offset)));

    let mut out = Vec::with_capacity(slots.len());
    let mut next = 0;
    for (p, page) in pages.iter_mut().enumerate() {
        let mut rest: &'a mut [T] = page.as_mut_slice();
        let mut consumed = 0;
        while next < slots.len() && slots[next].page == p {
            let s = slots[next];
            let (_, tail) = std::mem::take(&mut rest).split_at_mut((s.offset - consumed) * width);
            let (head, tail) = tail.split_at_mut(s.len * width);
            out.push(head);
            rest = tail;
            consumed = s.offset + s.len;
            next += 1;
        }
    }
    out
}
