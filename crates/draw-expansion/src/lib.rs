//! Expand compact draw descriptors into indexed indirect draw commands.
//!
//! The kernel itself lives in the `kernel` crate so that it can be compiled for the GPU. This
//! crate validates dispatches, runs the kernel on the CPU, a pool of threads or the GPU, and
//! manages batches of draws that share vertex and index buffers.

pub mod batch;
pub mod compute;
pub mod config;
/// Reading and writing the files the CLI consumes and produces.
pub mod draws {
    pub mod read;
    pub mod table;
    pub mod write;
}
pub mod gpu;
