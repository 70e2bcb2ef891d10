//! The draw expansion kernel. We keep it in a seperate crate so that it can be compiled to shader
//! representations.
//!
//! This crate can be run both on the GPU and CPU.

#![expect(
    clippy::indexing_slicing,
    reason = "This needs to be able to run on the GPU"
)]
#![cfg_attr(target_arch = "spirv", no_std)]
#![expect(
    clippy::arithmetic_side_effects,
    reason = "`rust-gpu` is a subset of Rust and has some unique requirements"
)]

#[cfg(target_arch = "spirv")]
use spirv_std::spirv;

pub mod command;
pub mod constants;
pub mod kernel;
pub mod lanes;

/// The main entrypoint to the shader.
#[cfg(target_arch = "spirv")]
#[spirv(compute(threads(64, 1, 1)))]
pub fn main(
    #[spirv(global_invocation_id)] id: spirv_std::glam::UVec3,
    #[spirv(storage_buffer, descriptor_set = 0, binding = 0)] descriptors: &[command::DrawDescriptor],
    #[spirv(storage_buffer, descriptor_set = 0, binding = 1)] commands: &mut [command::DrawCommand],
    #[spirv(uniform, descriptor_set = 0, binding = 2)] constants: &constants::Constants,
) {
    kernel::kernel(id.x, constants, descriptors, commands);
}
