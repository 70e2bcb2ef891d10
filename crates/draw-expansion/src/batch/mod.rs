//! A batch of draws sharing one vertex buffer and one index buffer.
//!
//! The batch owns the descriptor table the kernel reads. Geometry gets space in the shared
//! buffers, draws reference geometry, and the whole table is only expanded again after something
//! changed.

use color_eyre::{eyre::ContextCompat as _, Result};
use kernel::command::{DrawCommand, DrawDescriptor};

pub mod allocator;
pub mod manager;

/// Identifies geometry in a batch. Stays valid until the geometry is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(u32);

/// Identifies a draw in a batch. Stays valid until the draw is removed, even when other draws
/// are removed and the table shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawHandle(u32);

/// Where a mesh lives in the batch's buffers.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    /// First vertex in the vertex buffer.
    vertex_start: u32,
    /// Number of vertices.
    vertex_count: u32,
    /// First index in the index buffer.
    index_start: u32,
    /// Number of indices.
    index_count: u32,
    /// How many draws use this geometry.
    draws: u32,
}

/// An entry in the draw table, parallel to the descriptors.
#[derive(Debug, Clone, Copy)]
struct Draw {
    /// The draw's own handle.
    handle: DrawHandle,
    /// The geometry it draws.
    geometry: GeometryHandle,
}

/// A batch of draws and their expanded indirect commands.
pub struct DrawBatch {
    /// Space in the shared vertex buffer.
    vertices: allocator::RangeAllocator,
    /// Space in the shared index buffer.
    indices: allocator::RangeAllocator,
    /// All the geometry in the batch.
    geometries: std::collections::HashMap<GeometryHandle, Geometry>,
    /// The kernel's input. Dense, the position is the draw ID.
    descriptors: Vec<DrawDescriptor>,
    /// Who owns each descriptor.
    draws: Vec<Draw>,
    /// The last expansion of the descriptors.
    commands: Vec<DrawCommand>,
    /// Source of new handles.
    next_handle: u32,
    /// Have the descriptors changed since the last expansion?
    is_dirty: bool,
}

impl DrawBatch {
    /// Instantiate an empty batch with room for `capacity` vertices and `capacity` indices.
    pub fn new(capacity: u32) -> Self {
        Self {
            vertices: allocator::RangeAllocator::new(capacity),
            indices: allocator::RangeAllocator::new(capacity),
            geometries: std::collections::HashMap::new(),
            descriptors: Vec::new(),
            draws: Vec::new(),
            commands: Vec::new(),
            next_handle: 0,
            is_dirty: false,
        }
    }

    /// Make room for a mesh in the batch's buffers.
    pub fn add_geometry(&mut self, vertex_count: u32, index_count: u32) -> Result<GeometryHandle> {
        if vertex_count == 0 || index_count == 0 {
            color_eyre::eyre::bail!(
                "Geometry needs at least one vertex and one index, got {vertex_count} and {index_count}"
            );
        }
        let Some(vertex_start) = self.vertices.allocate(vertex_count) else {
            color_eyre::eyre::bail!(
                "No room for {vertex_count} vertices in the batch ({} used)",
                self.vertices.used()
            );
        };
        let Some(index_start) = self.indices.allocate(index_count) else {
            let _freed = self.vertices.free(vertex_start);
            color_eyre::eyre::bail!(
                "No room for {index_count} indices in the batch ({} used)",
                self.indices.used()
            );
        };

        let handle = GeometryHandle(self.new_handle()?);
        let _previous = self.geometries.insert(
            handle,
            Geometry {
                vertex_start,
                vertex_count,
                index_start,
                index_count,
                draws: 0,
            },
        );
        tracing::trace!("Geometry {handle:?}: vertices at {vertex_start}, indices at {index_start}");
        Ok(handle)
    }

    /// Draw the whole of some geometry.
    pub fn add_draw(&mut self, geometry_handle: GeometryHandle) -> Result<DrawHandle> {
        let geometry = self
            .geometries
            .get_mut(&geometry_handle)
            .context("No such geometry in the batch")?;
        let handle = DrawHandle(self.next_handle);
        self.next_handle = self
            .next_handle
            .checked_add(1)
            .context("Ran out of batch handles")?;
        geometry.draws = geometry.draws.saturating_add(1);

        self.descriptors.push(DrawDescriptor {
            vertex_start: geometry.vertex_start,
            vertex_count: geometry.vertex_count,
            index_start: geometry.index_start,
            index_count: geometry.index_count,
        });
        self.draws.push(Draw {
            handle,
            geometry: geometry_handle,
        });
        self.is_dirty = true;
        Ok(handle)
    }

    /// Is there space for a mesh of this size?
    pub fn has_room(&self, vertex_count: u32, index_count: u32) -> bool {
        self.vertices.fits(vertex_count) && self.indices.fits(index_count)
    }

    /// Add a mesh and a draw of it in one go.
    pub fn add(&mut self, vertex_count: u32, index_count: u32) -> Result<DrawHandle> {
        let geometry = self.add_geometry(vertex_count, index_count)?;
        self.add_draw(geometry)
    }

    /// Only draw `count` indices of the draw's geometry, starting `offset` indices in. Used for
    /// things like animation frames packed into one mesh.
    pub fn edit_index_range(&mut self, handle: DrawHandle, offset: u32, count: u32) -> Result<()> {
        let slot = self.slot(handle)?;
        let geometry = self
            .draws
            .get(slot)
            .and_then(|draw| self.geometries.get(&draw.geometry))
            .context("Draw refers to missing geometry")?;

        let end = offset.checked_add(count).context("Index range overflows")?;
        if end > geometry.index_count {
            color_eyre::eyre::bail!(
                "Index range {offset}..{end} is outside the geometry's {} indices",
                geometry.index_count
            );
        }
        let index_start = geometry
            .index_start
            .checked_add(offset)
            .context("Index range overflows")?;

        let descriptor = self
            .descriptors
            .get_mut(slot)
            .context("Draw table is out of step")?;
        descriptor.index_start = index_start;
        descriptor.index_count = count;
        self.is_dirty = true;
        Ok(())
    }

    /// Stop drawing. Later draws move down one draw ID.
    pub fn remove_draw(&mut self, handle: DrawHandle) -> Result<()> {
        let slot = self.slot(handle)?;
        let draw = self.draws.remove(slot);
        let _descriptor = self.descriptors.remove(slot);
        if let Some(geometry) = self.geometries.get_mut(&draw.geometry) {
            geometry.draws = geometry.draws.saturating_sub(1);
        }
        self.is_dirty = true;
        Ok(())
    }

    /// Give the geometry's space back. All its draws must have been removed first.
    pub fn remove_geometry(&mut self, handle: GeometryHandle) -> Result<()> {
        let geometry = self
            .geometries
            .get(&handle)
            .context("No such geometry in the batch")?;
        if geometry.draws > 0 {
            color_eyre::eyre::bail!(
                "All {} draws of {handle:?} must be removed before the geometry",
                geometry.draws
            );
        }

        let _vertices_freed = self.vertices.free(geometry.vertex_start);
        let _indices_freed = self.indices.free(geometry.index_start);
        let _removed = self.geometries.remove(&handle);
        Ok(())
    }

    /// Expand the descriptors if they changed since last time.
    pub fn update(&mut self, expander: &crate::compute::Expander) -> Result<&[DrawCommand]> {
        if self.is_dirty {
            tracing::debug!("Expanding batch of {} draws", self.descriptors.len());
            self.commands = expander.expand(&self.descriptors)?;
            self.is_dirty = false;
        }
        Ok(&self.commands)
    }

    /// The descriptor table, in draw ID order.
    pub fn descriptors(&self) -> &[DrawDescriptor] {
        &self.descriptors
    }

    /// The descriptor for a draw.
    pub fn descriptor(&self, handle: DrawHandle) -> Option<&DrawDescriptor> {
        self.slot(handle)
            .ok()
            .and_then(|slot| self.descriptors.get(slot))
    }

    /// Number of draws.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Are there no draws?
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Will the next update run the kernel?
    pub const fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Where a draw currently is in the table.
    fn slot(&self, handle: DrawHandle) -> Result<usize> {
        self.draws
            .iter()
            .position(|draw| draw.handle == handle)
            .context("No such draw in the batch")
    }

    /// A handle that hasn't been used before.
    fn new_handle(&mut self) -> Result<u32> {
        let handle = self.next_handle;
        self.next_handle = handle.checked_add(1).context("Ran out of batch handles")?;
        Ok(handle)
    }
}

#[expect(clippy::unwrap_used, clippy::indexing_slicing, reason = "These are just tests")]
#[cfg(test)]
mod test {
    use super::*;
    use crate::compute::Expander;
    use crate::config::{Backend, Partition};

    fn expander() -> Expander {
        Expander::new(Backend::Cpu, 64, Partition::Padded).unwrap()
    }

    #[test]
    fn draws_are_packed_into_the_buffers() {
        let mut batch = DrawBatch::new(1000);
        let _first = batch.add(3, 6).unwrap();
        let _second = batch.add(4, 12).unwrap();
        let _third = batch.add(8, 24).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            batch.descriptors(),
            [
                DrawDescriptor { vertex_start: 0, vertex_count: 3, index_start: 0,  index_count: 6 },
                DrawDescriptor { vertex_start: 3, vertex_count: 4, index_start: 6,  index_count: 12 },
                DrawDescriptor { vertex_start: 7, vertex_count: 8, index_start: 18, index_count: 24 },
            ]
        );

        let commands = batch.update(&expander()).unwrap();
        #[rustfmt::skip]
        assert_eq!(
            commands,
            [
                DrawCommand { index_count: 6,  instance_count: 1, first_index: 0,  base_vertex: 0, first_instance: 0 },
                DrawCommand { index_count: 12, instance_count: 1, first_index: 6,  base_vertex: 3, first_instance: 1 },
                DrawCommand { index_count: 24, instance_count: 1, first_index: 18, base_vertex: 7, first_instance: 2 },
            ]
        );
    }

    #[test]
    fn only_expands_after_changes() {
        let expander = expander();
        let mut batch = DrawBatch::new(100);
        assert!(!batch.is_dirty());
        assert!(batch.update(&expander).unwrap().is_empty());

        let draw = batch.add(3, 3).unwrap();
        assert!(batch.is_dirty());
        assert_eq!(batch.update(&expander).unwrap().len(), 1);
        assert!(!batch.is_dirty());

        batch.edit_index_range(draw, 0, 3).unwrap();
        assert!(batch.is_dirty());
        let _commands = batch.update(&expander).unwrap();
        assert!(!batch.is_dirty());
    }

    #[test]
    fn instances_share_geometry() {
        let mut batch = DrawBatch::new(100);
        let geometry = batch.add_geometry(4, 6).unwrap();
        let _first = batch.add_draw(geometry).unwrap();
        let _second = batch.add_draw(geometry).unwrap();

        let commands = batch.update(&expander()).unwrap();
        assert_eq!(commands[0].first_index, commands[1].first_index);
        assert_eq!(commands[0].base_vertex, commands[1].base_vertex);
        assert_eq!(commands[0].first_instance, 0);
        assert_eq!(commands[1].first_instance, 1);
    }

    #[test]
    fn editing_the_index_range() {
        let mut batch = DrawBatch::new(100);
        let _padding = batch.add(1, 10).unwrap();
        let draw = batch.add(4, 30).unwrap();

        batch.edit_index_range(draw, 12, 6).unwrap();
        let descriptor = batch.descriptor(draw).unwrap();
        assert_eq!(descriptor.index_start, 22);
        assert_eq!(descriptor.index_count, 6);

        let commands = batch.update(&expander()).unwrap();
        assert_eq!(commands[1].first_index, 22);
        assert_eq!(commands[1].index_count, 6);
    }

    #[test]
    fn editing_outside_the_geometry_fails() {
        let mut batch = DrawBatch::new(100);
        let draw = batch.add(4, 30).unwrap();
        assert!(batch.edit_index_range(draw, 25, 6).is_err());
        assert!(batch.edit_index_range(draw, u32::MAX, 2).is_err());
        assert_eq!(batch.descriptor(draw).unwrap().index_count, 30);
    }

    #[test]
    fn removing_a_draw_shifts_the_rest_down() {
        let mut batch = DrawBatch::new(100);
        let first = batch.add(1, 3).unwrap();
        let second = batch.add(2, 6).unwrap();
        let third = batch.add(3, 9).unwrap();

        batch.remove_draw(second).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.descriptor(second).is_none());
        assert_eq!(batch.descriptor(first).unwrap().index_count, 3);
        assert_eq!(batch.descriptor(third).unwrap().index_count, 9);

        let commands = batch.update(&expander()).unwrap();
        assert_eq!(commands[1].index_count, 9);
        assert_eq!(commands[1].first_instance, 1);

        assert!(batch.remove_draw(second).is_err());
    }

    #[test]
    fn geometry_outlives_its_draws() {
        let mut batch = DrawBatch::new(10);
        let geometry = batch.add_geometry(10, 10).unwrap();
        let draw = batch.add_draw(geometry).unwrap();

        assert!(batch.remove_geometry(geometry).is_err());
        batch.remove_draw(draw).unwrap();
        batch.remove_geometry(geometry).unwrap();
        assert!(batch.add_draw(geometry).is_err());

        // The space is free again.
        let _reused = batch.add_geometry(10, 10).unwrap();
    }

    #[test]
    fn full_batches_refuse_more_geometry() {
        let mut batch = DrawBatch::new(10);
        let _draw = batch.add(6, 2).unwrap();
        assert!(batch.add(6, 2).is_err());
        // A failed index allocation gives the vertices back.
        assert!(batch.add(4, 9).is_err());
        let _fits = batch.add(4, 8).unwrap();
    }

    #[test]
    fn stale_geometry_doesnt_use_up_a_handle() {
        let mut batch = DrawBatch::new(10);
        let geometry = batch.add_geometry(2, 2).unwrap();
        batch.remove_geometry(geometry).unwrap();

        let next_handle = batch.next_handle;
        assert!(batch.add_draw(geometry).is_err());
        assert_eq!(batch.next_handle, next_handle);
        assert!(batch.is_empty());
        assert!(!batch.is_dirty());
    }

    #[test]
    fn room_for_geometry() {
        let mut batch = DrawBatch::new(10);
        assert!(batch.has_room(10, 10));
        assert!(!batch.has_room(0, 10));
        let _draw = batch.add(6, 9).unwrap();
        assert!(batch.has_room(4, 1));
        assert!(!batch.has_room(5, 1));
        assert!(!batch.has_room(4, 2));
    }

    #[test]
    fn empty_geometry_is_refused() {
        let mut batch = DrawBatch::new(10);
        assert!(batch.add(0, 3).is_err());
        assert!(batch.add(3, 0).is_err());
        assert!(batch.is_empty());
    }
}
