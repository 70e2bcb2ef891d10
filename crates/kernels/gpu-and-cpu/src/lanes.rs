//! Partitioning of the draw IDs `[0, N)` across lanes.
//!
//! Both partitions give each lane a contiguous range, lane ranges never overlap and, taken in
//! lane order, they tile `[0, N)` exactly.

/// The draw IDs a single lane is responsible for: `start..end`. A range where `start >= end` is
/// empty.
#[derive(Copy, Clone)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq, Eq))]
#[expect(
    clippy::exhaustive_structs,
    reason = "We're only sharing this in the workspace"
)]
pub struct LaneRange {
    /// First draw ID.
    pub start: u32,
    /// One past the last draw ID.
    pub end: u32,
}

impl LaneRange {
    /// The range for a lane, using whichever partition the constants ask for.
    #[inline]
    #[must_use]
    pub const fn for_lane(lane_id: u32, constants: &crate::constants::Constants) -> Self {
        if lane_id >= constants.lanes {
            return Self { start: 0, end: 0 };
        }

        if constants.is_balanced_lanes() {
            Self::balanced(lane_id, constants.draw_count, constants.lanes)
        } else {
            Self::padded(lane_id, constants.draw_count, constants.lanes)
        }
    }

    /// Every lane gets a chunk of `N / L + 1`, the last chunks are clamped to `N`.
    ///
    /// The `+ 1` over-estimates the chunk whenever `N` is a multiple of `L`, so the tail lanes
    /// can be left with nothing to do. The clamp keeps it correct.
    ///
    /// Caller must ensure `lanes > 0` and that `draw_count + lanes` fits in a `u32`.
    #[inline]
    #[must_use]
    pub const fn padded(lane_id: u32, draw_count: u32, lanes: u32) -> Self {
        let chunk = draw_count / lanes + 1;
        let start = lane_id * chunk;
        let upper = (lane_id + 1) * chunk;
        let end = if upper < draw_count { upper } else { draw_count };
        Self { start, end }
    }

    /// Every lane gets `N / L` draws and the first `N % L` lanes get one more.
    ///
    /// Caller must ensure `lanes > 0`.
    #[inline]
    #[must_use]
    pub const fn balanced(lane_id: u32, draw_count: u32, lanes: u32) -> Self {
        let base = draw_count / lanes;
        let remainder = draw_count % lanes;
        let (offset, extra) = if lane_id < remainder {
            (lane_id, 1)
        } else {
            (remainder, 0)
        };
        let start = lane_id * base + offset;
        Self {
            start,
            end: start + base + extra,
        }
    }

    /// Does this lane have no work?
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// The number of draws in the range.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start
        }
    }
}

#[expect(
    clippy::indexing_slicing,
    clippy::as_conversions,
    reason = "These are just tests"
)]
