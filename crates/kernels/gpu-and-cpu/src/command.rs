//! The records the kernel reads and writes.

/// The compact per-draw record that a batch keeps for every draw. Four 32-bit components so that
/// it binds as a `vec4`-shaped storage element.
#[repr(C)]
#[derive(Copy, Clone)]
#[cfg_attr(
    not(target_arch = "spirv"),
    derive(Default, Debug, PartialEq, Eq, bytemuck::Zeroable, bytemuck::Pod)
)]
#[expect(
    clippy::exhaustive_structs,
    reason = "We're only sharing this in the workspace"
)]
pub struct DrawDescriptor {
    /// Where the draw's vertices start in the shared vertex buffer.
    pub vertex_start: u32,
    /// How many vertices the draw owns. Not needed by the kernel.
    pub vertex_count: u32,
    /// Where the draw's indices start in the shared index buffer.
    pub index_start: u32,
    /// How many indices to draw.
    pub index_count: u32,
}

/// An indexed indirect draw. The layout is fixed by the graphics APIs: it is the same as
/// `VkDrawIndexedIndirectCommand`, `D3D12_DRAW_INDEXED_ARGUMENTS` and
/// `wgpu::util::DrawIndexedIndirectArgs`. Reordering these fields draws the wrong geometry.
#[repr(C)]
#[derive(Copy, Clone)]
#[cfg_attr(
    not(target_arch = "spirv"),
    derive(Default, Debug, PartialEq, Eq, bytemuck::Zeroable, bytemuck::Pod)
)]
#[expect(
    clippy::exhaustive_structs,
    reason = "We're only sharing this in the workspace"
)]
pub struct DrawCommand {
    /// The number of indices to draw.
    pub index_count: u32,
    /// The number of instances to draw.
    pub instance_count: u32,
    /// The base index within the index buffer.
    pub first_index: u32,
    /// The value added to the vertex index before indexing into the vertex buffer.
    pub base_vertex: i32,
    /// The instance ID of the first instance. We use it to carry the draw ID so that per-draw
    /// instance data can be found again in the vertex shader.
    pub first_instance: u32,
}

impl DrawCommand {
    /// Expand a single descriptor. The output depends on nothing but the descriptor and its
    /// position.
    #[inline]
    #[must_use]
    pub const fn expand(draw_id: u32, descriptor: &DrawDescriptor) -> Self {
        #[expect(
            clippy::as_conversions,
            clippy::cast_possible_wrap,
            reason = "The GPU reinterprets the bits, so do we"
        )]
        let base_vertex = descriptor.vertex_start as i32;

        Self {
            index_count: descriptor.index_count,
            instance_count: 1,
            first_index: descriptor.index_start,
            base_vertex,
            first_instance: draw_id,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn layouts_match_the_graphics_apis() {
        assert_eq!(core::mem::size_of::<DrawDescriptor>(), 16);
        assert_eq!(core::mem::size_of::<DrawCommand>(), 20);
    }

    #[test]
    fn field_mapping() {
        let descriptor = DrawDescriptor {
            vertex_start: 10,
            vertex_count: 99,
            index_start: 100,
            index_count: 5,
        };
        assert_eq!(
            DrawCommand::expand(7, &descriptor),
            DrawCommand {
                index_count: 5,
                instance_count: 1,
                first_index: 100,
                base_vertex: 10,
                first_instance: 7,
            }
        );
    }

    #[test]
    fn vertex_count_is_ignored() {
        let mut descriptor = DrawDescriptor {
            vertex_start: 3,
            vertex_count: 0,
            index_start: 6,
            index_count: 9,
        };
        let before = DrawCommand::expand(1, &descriptor);
        descriptor.vertex_count = 12345;
        assert_eq!(DrawCommand::expand(1, &descriptor), before);
    }

    #[test]
    fn base_vertex_keeps_its_bits() {
        let descriptor = DrawDescriptor {
            vertex_start: u32::MAX,
            ..Default::default()
        };
        assert_eq!(DrawCommand::expand(0, &descriptor).base_vertex, -1);
    }
}
