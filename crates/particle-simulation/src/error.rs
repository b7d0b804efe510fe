//! Errors raised while setting up or talking to the GPU

use particle_physics::PhysicsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to open GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to map readback buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("failed to wait for the GPU: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("unsupported on the GPU: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Physics(#[from] PhysicsError),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
