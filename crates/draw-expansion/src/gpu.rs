//! Run the draw expansion kernel on the GPU with `wgpu`.
//!
//! The output buffer is created with `INDIRECT` usage, so callers that render can hand it
//! straight to `draw_indexed_indirect` without it ever leaving the GPU.

use color_eyre::{eyre::WrapErr as _, Result};
use kernel::command::{DrawCommand, DrawDescriptor};
use kernel::constants::Constants;
use pollster::FutureExt as _;
use wgpu::util::DeviceExt as _;

/// The WGSL port of the kernel.
const SHADER: &str = include_str!("shaders/expand_draws.wgsl");

/// Descriptor buffer binding.
const DESCRIPTORS_BINDING: u32 = 0;
/// Indirect buffer binding.
const COMMANDS_BINDING: u32 = 1;
/// Uniform binding.
const CONSTANTS_BINDING: u32 = 2;

/// GPU handles needed to run the kernel.
pub struct Gpu {
    /// Logical device, a connection to the physical device.
    device: wgpu::Device,
    /// Commands queue on the device.
    queue: wgpu::Queue,
    /// The compiled kernel.
    pipeline: wgpu::ComputePipeline,
    /// Layout of the kernel's three bindings.
    bind_group_layout: wgpu::BindGroupLayout,
    /// What the device can handle. Dispatches beyond these fail validation.
    limits: wgpu::Limits,
}

impl Gpu {
    /// Find an adapter and build the compute pipeline.
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::default();

        tracing::info!("Requesting GPU adapter");
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .block_on()
            .wrap_err("No supported GPU adapter")?;
        tracing::info!("Using GPU adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("draw expansion device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .block_on()
            .wrap_err("Failed to init device, missing required features?")?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("expand draws shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("expand draws bind group layout"),
            entries: &[
                // draw descriptors
                storage_entry(DESCRIPTORS_BINDING, true),
                // out draw commands (draw indirect buffer)
                storage_entry(COMMANDS_BINDING, false),
                // constants uniform
                wgpu::BindGroupLayoutEntry {
                    binding: CONSTANTS_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(byte_size::<Constants>(1)),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("expand draws pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("expand draws pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let limits = device.limits();
        tracing::debug!(
            "Device limits: {} workgroups per dimension, {} byte storage bindings",
            limits.max_compute_workgroups_per_dimension,
            limits.max_storage_buffer_binding_size
        );

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            limits,
        })
    }

    /// Expand the descriptors into a new GPU-resident indirect buffer.
    ///
    /// The buffer holds exactly `constants.draw_count` commands and can be used for indirect
    /// draws or copied from.
    pub fn expand_to_buffer(
        &self,
        constants: &Constants,
        descriptors: &[DrawDescriptor],
    ) -> Result<wgpu::Buffer> {
        let draw_count = usize::try_from(constants.draw_count)?;
        let Some(descriptors) = descriptors.get(..draw_count) else {
            color_eyre::eyre::bail!(
                "{} descriptors given for a dispatch of {draw_count}",
                descriptors.len()
            );
        };
        if draw_count == 0 {
            color_eyre::eyre::bail!("Buffers can't be empty, don't dispatch zero draws.");
        }
        check_limits(&self.limits, constants)?;

        let descriptors_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("draw descriptors"),
                contents: bytemuck::cast_slice(descriptors),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let commands_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("draw indirect buffer"),
            size: byte_size::<DrawCommand>(draw_count),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let constants_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("draw expansion constants"),
                contents: bytemuck::bytes_of(constants),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("expand draws bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: DESCRIPTORS_BINDING,
                    resource: descriptors_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: COMMANDS_BINDING,
                    resource: commands_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: CONSTANTS_BINDING,
                    resource: constants_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("expand draws commands encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("expand draws pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroup_count(constants.lanes), 1, 1);
        }
        let _index = self.queue.submit(std::iter::once(encoder.finish()));

        Ok(commands_buffer)
    }

    /// Expand the descriptors on the GPU and read the commands back.
    pub fn run(
        &self,
        constants: &Constants,
        descriptors: &[DrawDescriptor],
    ) -> Result<Vec<DrawCommand>> {
        let commands_buffer = self.expand_to_buffer(constants, descriptors)?;
        let size = commands_buffer.size();

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("draw indirect readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("draw indirect readback encoder"),
            });
        encoder.copy_buffer_to_buffer(&commands_buffer, 0, &staging_buffer, 0, size);
        let _index = self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            if sender.send(result).is_err() {
                tracing::error!("Readback receiver dropped before mapping finished");
            }
        });
        let _status = self
            .device
            .poll(wgpu::PollType::Wait)
            .wrap_err("Waiting for the GPU failed")?;
        receiver
            .recv()
            .wrap_err("Readback channel closed")?
            .wrap_err("Couldn't map the readback buffer")?;

        let commands = {
            let view = slice.get_mapped_range();
            bytemuck::pod_collect_to_vec::<u8, DrawCommand>(&view)
        };
        staging_buffer.unmap();

        Ok(commands)
    }
}

/// Refuse dispatches the device would reject. `wgpu` reports those as validation errors, which
/// panic rather than returning.
fn check_limits(limits: &wgpu::Limits, constants: &Constants) -> Result<()> {
    let workgroups = workgroup_count(constants.lanes);
    if workgroups > limits.max_compute_workgroups_per_dimension {
        color_eyre::eyre::bail!(
            "{} lanes needs {workgroups} workgroups, the device only allows {}",
            constants.lanes,
            limits.max_compute_workgroups_per_dimension
        );
    }

    let draw_count = usize::try_from(constants.draw_count)?;
    let binding_limit = u64::from(limits.max_storage_buffer_binding_size);
    for (name, size) in [
        ("descriptor", byte_size::<DrawDescriptor>(draw_count)),
        ("indirect", byte_size::<DrawCommand>(draw_count)),
    ] {
        if size > binding_limit {
            color_eyre::eyre::bail!(
                "{draw_count} draws needs a {size} byte {name} buffer, the device only binds up \
                 to {binding_limit} bytes"
            );
        }
        if size > limits.max_buffer_size {
            color_eyre::eyre::bail!(
                "{draw_count} draws needs a {size} byte {name} buffer, the device only allows up \
                 to {} bytes",
                limits.max_buffer_size
            );
        }
    }

    Ok(())
}

/// A compute-visible storage buffer binding.
const fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// The byte size of `count` items of `T`.
#[expect(
    clippy::as_conversions,
    reason = "`usize` is never wider than `u64` on the platforms `wgpu` supports"
)]
const fn byte_size<T>(count: usize) -> u64 {
    (count * std::mem::size_of::<T>()) as u64
}

/// Enough workgroups that every lane gets an invocation.
const fn workgroup_count(lanes: u32) -> u32 {
    lanes.div_ceil(kernel::constants::WORKGROUP_SIZE)
}
