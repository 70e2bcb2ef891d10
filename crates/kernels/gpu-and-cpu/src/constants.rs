//! Constants and flags for the kernel.

/// The number of invocations in a single workgroup. The SPIR-V entrypoint and the WGSL port
/// both declare `64 x 1 x 1`.
pub const WORKGROUP_SIZE: u32 = 64;

/// One workgroup's worth of lanes.
pub const DEFAULT_LANES: u32 = WORKGROUP_SIZE;

/// Parameters that don't change for the entirety of a dispatch. Shaped as a single 4-component
/// uniform.
#[repr(C)]
#[derive(Copy, Clone)]
#[cfg_attr(
    not(target_arch = "spirv"),
    derive(
        Default, Debug, PartialEq, Eq,
        // Bytemuck is what we use to cast data into raw bytes for CPU/GPU transfer.
        bytemuck::Zeroable, bytemuck::Pod,
    )
)]
#[expect(
    clippy::exhaustive_structs,
    clippy::pub_underscore_fields,
    reason = "We're only sharing this in the workspace"
)]
pub struct Constants {
    /// The total number of draw descriptors to expand, `N`.
    pub draw_count: u32,
    /// The number of lanes the draws are partitioned across, `L`.
    pub lanes: u32,
    /// Bitmask of kernel behaviour, see [`Flag`].
    pub flags: u32,
    /// Padding.
    pub _pad0: u32,
}

impl Constants {
    /// Should lanes get an even share of the draws instead of the padded chunks?
    #[inline]
    #[must_use]
    pub const fn is_balanced_lanes(&self) -> bool {
        (self.flags & Flag::BalancedLanes.bit()) != 0
    }
}

#[repr(u32)]
#[expect(
    clippy::exhaustive_enums,
    reason = "We're only using it within our workspace"
)]
/// Bitmask of kernel behaviour.
pub enum Flag {
    /// Partition draws so that every lane gets either `N / L` or `N / L + 1` of them.
    BalancedLanes = 1 << 0,
}

impl Flag {
    #[expect(clippy::as_conversions, reason = "It's just a bit mask.")]
    /// Just a single point to do cast from.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u32 {
        self as u32
    }
}
