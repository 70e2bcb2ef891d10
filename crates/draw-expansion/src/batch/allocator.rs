//! First-fit allocation of ranges in a fixed-size buffer. Used for both the vertex and index
//! buffers of a batch.

/// A single allocated range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Allocation {
    /// First element.
    start: u32,
    /// Number of elements.
    length: u32,
}

impl Allocation {
    /// One past the last element.
    const fn end(self) -> u32 {
        self.start.saturating_add(self.length)
    }
}

/// Hands out non-overlapping ranges of `[0, capacity)`.
#[derive(Debug, Clone)]
pub struct RangeAllocator {
    /// The size of the underlying buffer, in elements.
    capacity: u32,
    /// Allocations, kept sorted by `start`.
    allocations: Vec<Allocation>,
}

impl RangeAllocator {
    /// Instantiate with nothing allocated.
    pub const fn new(capacity: u32) -> Self {
        Self {
            capacity,
            allocations: Vec::new(),
        }
    }

    /// Reserve `amount` elements in the lowest gap they fit in. Returns the start of the range,
    /// or `None` when there's no room or nothing was asked for.
    pub fn allocate(&mut self, amount: u32) -> Option<u32> {
        let (position, start) = self.first_fit(amount)?;
        self.allocations.insert(
            position,
            Allocation {
                start,
                length: amount,
            },
        );
        Some(start)
    }

    /// Would `allocate(amount)` succeed?
    pub fn fits(&self, amount: u32) -> bool {
        self.first_fit(amount).is_some()
    }

    /// Where a new allocation of `amount` would go in `allocations`, and its start.
    fn first_fit(&self, amount: u32) -> Option<(usize, u32)> {
        if amount == 0 {
            return None;
        }

        let mut cursor = 0;
        for (index, allocation) in self.allocations.iter().enumerate() {
            if allocation.start.saturating_sub(cursor) >= amount {
                return Some((index, cursor));
            }
            cursor = allocation.end();
        }

        (self.capacity.saturating_sub(cursor) >= amount).then_some((self.allocations.len(), cursor))
    }

    /// Release the range starting at `start`. Returns whether there was one.
    pub fn free(&mut self, start: u32) -> bool {
        match self
            .allocations
            .binary_search_by_key(&start, |allocation| allocation.start)
        {
            Ok(index) => {
                let _freed = self.allocations.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    /// The total number of allocated elements.
    pub fn used(&self) -> u32 {
        self.allocations
            .iter()
            .fold(0, |total, allocation| total.saturating_add(allocation.length))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocates_back_to_back() {
        let mut allocator = RangeAllocator::new(100);
        assert_eq!(allocator.allocate(10), Some(0));
        assert_eq!(allocator.allocate(20), Some(10));
        assert_eq!(allocator.allocate(5), Some(30));
        assert_eq!(allocator.used(), 35);
    }

    #[test]
    fn reuses_the_first_gap_that_fits() {
        let mut allocator = RangeAllocator::new(100);
        assert_eq!(allocator.allocate(10), Some(0));
        assert_eq!(allocator.allocate(20), Some(10));
        assert_eq!(allocator.allocate(10), Some(30));
        assert!(allocator.free(10));

        // Too big for the gap, goes on the end.
        assert_eq!(allocator.allocate(25), Some(40));
        // Fits in the gap.
        assert_eq!(allocator.allocate(15), Some(10));
        assert_eq!(allocator.allocate(5), Some(25));
    }

    #[test]
    fn refuses_when_full() {
        let mut allocator = RangeAllocator::new(10);
        assert_eq!(allocator.allocate(8), Some(0));
        assert_eq!(allocator.allocate(3), None);
        assert_eq!(allocator.allocate(2), Some(8));
        assert_eq!(allocator.allocate(1), None);
    }

    #[test]
    fn fits_agrees_with_allocate() {
        let mut allocator = RangeAllocator::new(10);
        assert!(allocator.fits(10));
        assert!(!allocator.fits(11));
        assert!(!allocator.fits(0));
        assert_eq!(allocator.allocate(7), Some(0));
        assert!(allocator.fits(3));
        assert!(!allocator.fits(4));
        assert_eq!(allocator.used(), 7);
    }

    #[test]
    fn refuses_nothing() {
        let mut allocator = RangeAllocator::new(10);
        assert_eq!(allocator.allocate(0), None);
    }

    #[test]
    fn freeing_unknown_ranges() {
        let mut allocator = RangeAllocator::new(10);
        assert_eq!(allocator.allocate(4), Some(0));
        assert!(!allocator.free(2));
        assert!(allocator.free(0));
        assert!(!allocator.free(0));
        assert_eq!(allocator.used(), 0);
    }
}
