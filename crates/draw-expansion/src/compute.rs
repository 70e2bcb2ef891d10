//! The main entrypoint for running the kernel.

use color_eyre::{
    eyre::{ContextCompat as _, WrapErr as _},
    Result,
};
use kernel::command::{DrawCommand, DrawDescriptor};
use kernel::constants::Constants;
use kernel::lanes::LaneRange;

/// Validates dispatches and runs the kernel on the chosen backend.
pub struct Expander {
    /// Where to run the kernel computations.
    backend: crate::config::Backend,
    /// The constants for every dispatch. `draw_count` is filled in per dispatch.
    pub constants: Constants,
    /// GPU manager, only set up for the GPU backend.
    gpu: Option<crate::gpu::Gpu>,
}

impl Expander {
    /// Instantiate.
    pub fn new(
        backend: crate::config::Backend,
        lanes: u32,
        partition: crate::config::Partition,
    ) -> Result<Self> {
        if lanes == 0 {
            color_eyre::eyre::bail!("At least one lane is needed to expand draws.");
        }

        let constants = Constants {
            draw_count: 0,
            lanes,
            flags: partition.kernel_flags(),
            ..Default::default()
        };

        let gpu = if matches!(backend, crate::config::Backend::Gpu) {
            Some(crate::gpu::Gpu::new().wrap_err("Couldn't set up the GPU backend")?)
        } else {
            None
        };

        tracing::debug!("Expander ready: {backend:?} with {constants:?}");

        Ok(Self {
            backend,
            constants,
            gpu,
        })
    }

    /// Where the kernel runs.
    pub const fn backend(&self) -> crate::config::Backend {
        self.backend
    }

    /// Expand descriptors into a newly allocated indirect buffer of exactly the same length.
    pub fn expand(&self, descriptors: &[DrawDescriptor]) -> Result<Vec<DrawCommand>> {
        let mut commands = vec![DrawCommand::default(); descriptors.len()];
        self.dispatch(descriptors, &mut commands)?;
        Ok(commands)
    }

    /// Expand every descriptor into the command at the same index. Commands past the number of
    /// descriptors are left untouched.
    pub fn dispatch(
        &self,
        descriptors: &[DrawDescriptor],
        commands: &mut [DrawCommand],
    ) -> Result<()> {
        let constants = self.constants_for(descriptors, commands)?;
        if constants.draw_count == 0 {
            tracing::debug!("No draws to expand");
            return Ok(());
        }

        let start = std::time::Instant::now();
        match self.backend {
            crate::config::Backend::Cpu => Self::dispatch_cpu(&constants, descriptors, commands),
            crate::config::Backend::Threads => {
                Self::dispatch_threads(&constants, descriptors, commands)?;
            }
            crate::config::Backend::Gpu => {
                self.dispatch_gpu(&constants, descriptors, commands)?;
            }
        }
        tracing::debug!(
            "Expanded {} draws across {} lanes on {:?} in {:?}",
            constants.draw_count,
            constants.lanes,
            self.backend,
            start.elapsed()
        );

        Ok(())
    }

    /// Check everything the kernel can't check for itself, and fill in the draw count.
    fn constants_for(
        &self,
        descriptors: &[DrawDescriptor],
        commands: &[DrawCommand],
    ) -> Result<Constants> {
        if self.constants.lanes == 0 {
            color_eyre::eyre::bail!("At least one lane is needed to expand draws.");
        }

        let draw_count = u32::try_from(descriptors.len())
            .wrap_err("Too many draws for a single dispatch")?;

        // The padded partition computes lane bounds up to `N + L`.
        if draw_count.checked_add(self.constants.lanes).is_none() {
            color_eyre::eyre::bail!(
                "{draw_count} draws across {} lanes overflows the kernel's lane arithmetic",
                self.constants.lanes
            );
        }

        if commands.len() < descriptors.len() {
            color_eyre::eyre::bail!(
                "The indirect buffer only has room for {} commands, but there are {} draws",
                commands.len(),
                descriptors.len()
            );
        }

        Ok(Constants {
            draw_count,
            ..self.constants
        })
    }

    /// Run every lane, one after the other, on this thread.
    fn dispatch_cpu(
        constants: &Constants,
        descriptors: &[DrawDescriptor],
        commands: &mut [DrawCommand],
    ) {
        for lane_id in 0..constants.lanes {
            kernel::kernel::kernel(lane_id, constants, descriptors, commands);
        }
    }

    /// Hand each lane its own slice of the indirect buffer and run the lanes on a pool of
    /// threads.
    fn dispatch_threads(
        constants: &Constants,
        descriptors: &[DrawDescriptor],
        commands: &mut [DrawCommand],
    ) -> Result<()> {
        let workers = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        let mut shares: Vec<Vec<(LaneRange, &mut [DrawCommand])>> =
            (0..workers).map(|_| Vec::new()).collect();

        let draw_count = usize::try_from(constants.draw_count)?;
        let mut remaining = commands
            .get_mut(..draw_count)
            .context("The indirect buffer is smaller than the draw count")?;
        let mut active_lanes = 0usize;
        for lane_id in 0..constants.lanes {
            let lane = LaneRange::for_lane(lane_id, constants);
            if lane.is_empty() {
                continue;
            }

            // Lanes tile the draws in order, so each lane's slice is the front of what's left.
            let (span, rest) = std::mem::take(&mut remaining)
                .split_at_mut_checked(usize::try_from(lane.len())?)
                .context("Lane ranges overran the indirect buffer")?;
            remaining = rest;

            if let Some(share) = shares.get_mut(active_lanes % workers) {
                share.push((lane, span));
            }
            active_lanes = active_lanes.saturating_add(1);
        }

        tracing::trace!("Running {active_lanes} active lanes on {workers} threads");

        std::thread::scope(|scope| {
            let handles = shares
                .into_iter()
                .filter(|share| !share.is_empty())
                .map(|share| {
                    scope.spawn(move || {
                        for (lane, span) in share {
                            expand_lane(lane, descriptors, span);
                        }
                    })
                })
                .collect::<Vec<_>>();

            for handle in handles {
                handle
                    .join()
                    .map_err(|_| color_eyre::eyre::eyre!("A lane worker panicked"))?;
            }
            Ok(())
        })
    }

    /// Do the whole dispatch on the GPU.
    fn dispatch_gpu(
        &self,
        constants: &Constants,
        descriptors: &[DrawDescriptor],
        commands: &mut [DrawCommand],
    ) -> Result<()> {
        let Some(gpu) = self.gpu.as_ref() else {
            color_eyre::eyre::bail!("`self.gpu` not instantiated yet.");
        };

        let expanded = gpu.run(constants, descriptors)?;
        commands
            .get_mut(..expanded.len())
            .context("The indirect buffer is smaller than the GPU's output")?
            .copy_from_slice(&expanded);
        Ok(())
    }
}

/// Expand a single lane into its own slice of the indirect buffer.
#[expect(
    clippy::as_conversions,
    reason = "`u32` draw IDs always fit in a `usize`"
)]
fn expand_lane(lane: LaneRange, descriptors: &[DrawDescriptor], span: &mut [DrawCommand]) {
    let sources = descriptors.iter().skip(lane.start as usize);
    for ((draw_id, command), descriptor) in (lane.start..lane.end).zip(span.iter_mut()).zip(sources)
    {
        *command = DrawCommand::expand(draw_id, descriptor);
    }
}
