//! Sparse DRAM backing store.
//!
//! Main memory may be configured far larger than what a workload touches, so
//! contents are held in lazily allocated 4 KiB pages. Untouched bytes read as
//! zero. Addresses are memory-relative; range checks belong to the caller.

use std::collections::HashMap;

const PAGE_SHIFT: u32 = 12;
const PAGE_SIZE: usize = 1 << PAGE_SHIFT;
const PAGE_MASK: u64 = PAGE_SIZE as u64 - 1;

/// Page-granular sparse byte store.
#[derive(Debug, Default)]
pub struct DramBuffer {
    pages: HashMap<u64, Box<[u8; PAGE_SIZE]>>,
}

impl DramBuffer {
    /// Creates an empty buffer; every byte reads as zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pages that have been written.
    pub fn resident_pages(&self) -> usize {
        self.pages.len()
    }

    /// Copies `out.len()` bytes starting at `offset` into `out`.
    pub fn read(&self, offset: u64, out: &mut [u8]) {
        let mut done = 0;
        while done < out.len() {
            let addr = offset + done as u64;
            let in_page = (addr & PAGE_MASK) as usize;
            let n = (PAGE_SIZE - in_page).min(out.len() - done);
            match self.pages.get(&(addr >> PAGE_SHIFT)) {
                Some(page) => out[done..done + n].copy_from_slice(&page[in_page..in_page + n]),
                None => out[done..done + n].fill(0),
            }
            done += n;
        }
    }

    /// Writes `data` starting at `offset`, allocating pages on demand.
    pub fn write(&mut self, offset: u64, data: &[u8]) {
        let mut done = 0;
        while done < data.len() {
            let addr = offset + done as u64;
            let in_page = (addr & PAGE_MASK) as usize;
            let n = (PAGE_SIZE - in_page).min(data.len() - done);
            let page = self
                .pages
                .entry(addr >> PAGE_SHIFT)
                .or_insert_with(|| Box::new([0; PAGE_SIZE]));
            page[in_page..in_page + n].copy_from_slice(&data[done..done + n]);
            done += n;
        }
    }
}
