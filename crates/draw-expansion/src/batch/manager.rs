//! Spreads draws over as many batches as it takes.

use color_eyre::{eyre::WrapErr as _, Result};
use kernel::command::DrawCommand;

use super::{DrawBatch, DrawHandle};

/// Owns a growing list of equally sized batches. New geometry goes in the first batch with room
/// for it, or a fresh batch when they're all full.
pub struct BatchManager {
    /// Every batch opened so far, in the order they were opened.
    batches: Vec<DrawBatch>,
    /// The vertex and index capacity of each batch.
    batch_capacity: u32,
}

impl BatchManager {
    /// Instantiate with no batches.
    pub const fn new(batch_capacity: u32) -> Self {
        Self {
            batches: Vec::new(),
            batch_capacity,
        }
    }

    /// Add a mesh and a draw of it. Returns the index of the batch it went in.
    pub fn add(&mut self, vertex_count: u32, index_count: u32) -> Result<(usize, DrawHandle)> {
        if vertex_count == 0 || index_count == 0 {
            color_eyre::eyre::bail!(
                "Geometry needs at least one vertex and one index, got {vertex_count} and {index_count}"
            );
        }
        if vertex_count > self.batch_capacity || index_count > self.batch_capacity {
            color_eyre::eyre::bail!(
                "Geometry of {vertex_count} vertices and {index_count} indices can never fit in a \
                 batch of {}",
                self.batch_capacity
            );
        }

        let index = match self
            .batches
            .iter()
            .position(|batch| batch.has_room(vertex_count, index_count))
        {
            Some(index) => index,
            None => {
                self.batches.push(DrawBatch::new(self.batch_capacity));
                tracing::debug!("Opened batch {}", self.batches.len());
                self.batches.len().saturating_sub(1)
            }
        };

        let batch = self.batch_mut(index)?;
        let handle = batch.add(vertex_count, index_count)?;
        Ok((index, handle))
    }

    /// Expand every batch that changed. Returns the commands of each batch, in batch order.
    pub fn update_all(
        &mut self,
        expander: &crate::compute::Expander,
    ) -> Result<Vec<&[DrawCommand]>> {
        let mut all_commands = Vec::with_capacity(self.batches.len());
        for (index, batch) in self.batches.iter_mut().enumerate() {
            let commands = batch
                .update(expander)
                .wrap_err_with(|| format!("Couldn't expand batch {index}"))?;
            all_commands.push(commands);
        }
        Ok(all_commands)
    }

    /// A batch by index.
    pub fn batch(&self, index: usize) -> Option<&DrawBatch> {
        self.batches.get(index)
    }

    /// A batch by index, for editing its draws.
    pub fn batch_mut(&mut self, index: usize) -> Result<&mut DrawBatch> {
        let count = self.batches.len();
        self.batches.get_mut(index).ok_or_else(|| {
            color_eyre::eyre::eyre!("No batch {index}, there are only {count} batches")
        })
    }

    /// The number of open batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Have no batches been opened yet?
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// The number of draws across every batch.
    pub fn draw_count(&self) -> usize {
        self.batches.iter().map(DrawBatch::len).sum()
    }
}
