//! GPU-side layouts and buffer helpers

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use particle_physics::{Bvh, NodeKind};

use crate::error::{Result, SimulationError};

/// Node kind tag in [`GpuNode::kind`] (matches WGSL `NODE_LEAF`)
pub const NODE_LEAF: u32 = 0;
/// Node kind tag in [`GpuNode::kind`] (matches WGSL `NODE_INTERNAL`)
pub const NODE_INTERNAL: u32 = 1;

/// Smallest size given to any storage buffer; wgpu rejects empty bindings
const MIN_BUFFER_SIZE: u64 = 16;

/// Flattened BVH node (matches WGSL `Node`)
///
/// For a leaf `left` holds the object index and `right` is unused.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuNode {
    pub min: [f32; 2],
    pub max: [f32; 2],
    pub kind: u32,
    pub left: u32,
    pub right: u32,
    pub _padding: u32,
}

impl GpuNode {
    pub fn from_bvh(bvh: &Bvh<Vec2>) -> Vec<Self> {
        bvh.nodes()
            .iter()
            .map(|node| {
                let (kind, left, right) = match node.kind {
                    NodeKind::Leaf(object_index) => (NODE_LEAF, object_index, 0),
                    NodeKind::Internal { left, right } => (NODE_INTERNAL, left, right),
                };
                Self {
                    min: node.aabb.top_left.to_array(),
                    max: node.aabb.bottom_right.to_array(),
                    kind,
                    left,
                    right,
                    _padding: 0,
                }
            })
            .collect()
    }
}

/// Atomic counters of the broad-phase kernel (matches WGSL `Counters`)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuCounters {
    /// Filled candidate slots, never above the capacity
    pub reserved: u32,
    pub stack_overflows: u32,
    pub candidate_overflows: u32,
    pub _padding: u32,
}

pub fn vec2_to_arrays(values: &[Vec2]) -> Vec<[f32; 2]> {
    values.iter().map(|v| v.to_array()).collect()
}

/// Storage buffer of at least `size` bytes, never empty
pub fn create_storage_buffer(
    device: &wgpu::Device,
    label: &str,
    size: u64,
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: padded_size(size),
        usage: wgpu::BufferUsages::STORAGE | usage,
        mapped_at_creation: false,
    })
}

/// Storage buffer initialised with `contents`, padded when empty
pub fn create_storage_buffer_init(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    contents: &[u8],
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    let buffer = create_storage_buffer(
        device,
        label,
        contents.len() as u64,
        usage | wgpu::BufferUsages::COPY_DST,
    );
    if !contents.is_empty() {
        queue.write_buffer(&buffer, 0, contents);
    }
    buffer
}

fn padded_size(size: u64) -> u64 {
    size.max(MIN_BUFFER_SIZE)
        .next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
}

/// Copy the first `size` bytes of `source` to the host
///
/// Blocks until the GPU has finished all submitted work.
pub fn read_buffer<T: Pod>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &wgpu::Buffer,
    size: u64,
) -> Result<Vec<T>> {
    if size == 0 {
        return Ok(Vec::new());
    }
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging Buffer"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::PollType::Wait {
        submission_index: None,
        timeout: None,
    })?;
    // A dropped callback means the mapping never completed
    receiver
        .recv()
        .map_err(|_| SimulationError::BufferMap(wgpu::BufferAsyncError))??;

    let values = {
        let data = slice.get_mapped_range();
        bytemuck::cast_slice::<u8, T>(&data[..]).to_vec()
    };
    staging.unmap();
    Ok(values)
}
