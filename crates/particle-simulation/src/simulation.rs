//! GPU simulation manager
//!
//! Owns the object buffers and runs the two compute kernels:
//! - `integrate.wgsl`: one Yoshida step per object
//! - `broad_phase.wgsl`: one tree query per object, appending to a shared
//!   candidate list guarded by an atomic length counter
//!
//! Only single precision is available on the GPU.

use glam::Vec2;
use particle_physics::{
    BroadPhaseReport, Bvh, CandidatePair, ObjectSoa, PhysicsError, Precision, SimulationConfig,
    GPU_MAX_STACK,
};

use crate::buffers::{
    create_storage_buffer, create_storage_buffer_init, read_buffer, vec2_to_arrays, GpuCounters,
    GpuNode,
};
use crate::context::GpuContext;
use crate::error::{Result, SimulationError};
use crate::SimulationParams;

/// Pairs and counters read back from one broad-phase dispatch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuBroadPhaseOutput {
    /// Canonical pairs in reservation order, duplicates across queries included
    pub pairs: Vec<CandidatePair>,
    pub report: BroadPhaseReport,
    /// Slots claimed by the kernel, capped at the candidate capacity
    pub reserved: u32,
}

/// GPU-based simulation of planets and particles
pub struct GpuSimulation {
    device: wgpu::Device,
    queue: wgpu::Queue,

    // Object buffers
    position_buffer: wgpu::Buffer,
    velocity_buffer: wgpu::Buffer,
    radius_buffer: wgpu::Buffer,
    _mass_buffer: wgpu::Buffer,
    planet_snapshot_buffer: wgpu::Buffer,

    // Broad-phase buffers
    node_buffer: wgpu::Buffer,
    candidate_buffer: wgpu::Buffer,
    counter_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,

    // Compute pipelines
    integrate_pipeline: wgpu::ComputePipeline,
    broad_phase_pipeline: wgpu::ComputePipeline,

    // Bind groups
    integrate_bind_group: wgpu::BindGroup,
    broad_phase_bind_group_layout: wgpu::BindGroupLayout,
    broad_phase_bind_group: wgpu::BindGroup,

    params: SimulationParams,
    config: SimulationConfig,
    node_capacity: usize,
}

fn buffer_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage(read_only: bool) -> wgpu::BufferBindingType {
    wgpu::BufferBindingType::Storage { read_only }
}

fn check_config(config: &SimulationConfig) -> Result<()> {
    config.validate()?;
    if config.precision != Precision::Single {
        return Err(SimulationError::Unsupported(format!(
            "{} precision (the GPU kernels are single precision only)",
            config.precision.name()
        )));
    }
    Ok(())
}

/// Traversal stack entries, clamped to the private stack of the kernel
fn gpu_stack_capacity(config: &SimulationConfig, object_count: usize) -> u32 {
    let wanted = config.broad_phase_params(object_count).stack_capacity;
    if wanted > GPU_MAX_STACK {
        log::warn!(
            "Traversal stack of {wanted} entries clamped to {GPU_MAX_STACK}; deep trees will report stack overflows"
        );
    }
    wanted.min(GPU_MAX_STACK)
}

impl GpuSimulation {
    pub fn new(
        context: GpuContext,
        objects: &ObjectSoa<Vec2>,
        config: &SimulationConfig,
    ) -> Result<Self> {
        log::info!("Initializing GpuSimulation...");
        check_config(config)?;
        objects.validate()?;

        let GpuContext { device, queue, .. } = context;
        let object_count =
            u32::try_from(objects.len()).map_err(|_| PhysicsError::InvalidParameter {
                name: "objects",
                reason: format!("{} objects do not fit 32-bit indices", objects.len()),
            })?;
        let candidate_capacity = object_count.saturating_mul(config.max_candidates);
        let params = SimulationParams::from_config(config).with_counts(
            object_count,
            objects.planet_count as u32,
            candidate_capacity,
            gpu_stack_capacity(config, objects.len()),
        );

        // Object buffers
        let position_buffer = create_storage_buffer_init(
            &device,
            &queue,
            "Position Buffer",
            bytemuck::cast_slice(&vec2_to_arrays(&objects.positions)),
            wgpu::BufferUsages::COPY_SRC,
        );
        let velocity_buffer = create_storage_buffer_init(
            &device,
            &queue,
            "Velocity Buffer",
            bytemuck::cast_slice(&vec2_to_arrays(&objects.velocities)),
            wgpu::BufferUsages::COPY_SRC,
        );
        let radius_buffer = create_storage_buffer_init(
            &device,
            &queue,
            "Radius Buffer",
            bytemuck::cast_slice(&objects.radii),
            wgpu::BufferUsages::empty(),
        );
        let mass_buffer = create_storage_buffer_init(
            &device,
            &queue,
            "Mass Buffer",
            bytemuck::cast_slice(&objects.masses),
            wgpu::BufferUsages::empty(),
        );
        // Start-of-step copy of the planet positions (front of the position buffer)
        let planet_snapshot_buffer = create_storage_buffer(
            &device,
            "Planet Snapshot Buffer",
            vec2_bytes(objects.planet_count),
            wgpu::BufferUsages::COPY_DST,
        );

        // Broad-phase buffers
        let node_capacity = (2 * objects.len()).saturating_sub(1).max(1);
        let node_buffer = create_node_buffer(&device, node_capacity);
        let candidate_buffer = create_storage_buffer(
            &device,
            "Candidate Buffer",
            u64::from(candidate_capacity) * std::mem::size_of::<CandidatePair>() as u64,
            wgpu::BufferUsages::COPY_SRC,
        );
        let counter_buffer = create_storage_buffer(
            &device,
            "Counter Buffer",
            std::mem::size_of::<GpuCounters>() as u64,
            wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        );
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Simulation Params Buffer"),
            size: std::mem::size_of::<SimulationParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&params_buffer, 0, bytemuck::cast_slice(&[params]));

        log::info!("Buffers created");

        // Load compute shaders
        let integrate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Integration Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/integrate.wgsl").into()),
        });
        let broad_phase_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Broad Phase Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/broad_phase.wgsl").into()),
        });

        log::info!("Shaders loaded");

        // Integration: positions, velocities, planet snapshot, masses, params
        let integrate_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Integration Bind Group Layout"),
                entries: &[
                    buffer_entry(0, storage(false)),
                    buffer_entry(1, storage(false)),
                    buffer_entry(2, storage(true)),
                    buffer_entry(3, storage(true)),
                    buffer_entry(4, wgpu::BufferBindingType::Uniform),
                ],
            });

        // Broad-phase: positions, radii, nodes, candidates, counters, params
        let broad_phase_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Broad Phase Bind Group Layout"),
                entries: &[
                    buffer_entry(0, storage(true)),
                    buffer_entry(1, storage(true)),
                    buffer_entry(2, storage(true)),
                    buffer_entry(3, storage(false)),
                    buffer_entry(4, storage(false)),
                    buffer_entry(5, wgpu::BufferBindingType::Uniform),
                ],
            });

        log::info!("Bind group layouts created");

        let workgroup_size = f64::from(config.workgroup_size);
        let integrate_pipeline = create_pipeline(
            &device,
            "Integration",
            &integrate_bind_group_layout,
            &integrate_shader,
            workgroup_size,
        );
        let broad_phase_pipeline = create_pipeline(
            &device,
            "Broad Phase",
            &broad_phase_bind_group_layout,
            &broad_phase_shader,
            workgroup_size,
        );

        log::info!("Compute pipelines created");

        let integrate_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Integration Bind Group"),
            layout: &integrate_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: position_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: velocity_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: planet_snapshot_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: mass_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let broad_phase_bind_group = create_broad_phase_bind_group(
            &device,
            &broad_phase_bind_group_layout,
            [
                &position_buffer,
                &radius_buffer,
                &node_buffer,
                &candidate_buffer,
                &counter_buffer,
                &params_buffer,
            ],
        );

        log::info!(
            "GpuSimulation ready: {} objects ({} planets), {} candidate slots, stack {}",
            object_count,
            objects.planet_count,
            candidate_capacity,
            params.counts[3]
        );

        Ok(Self {
            device,
            queue,
            position_buffer,
            velocity_buffer,
            radius_buffer,
            _mass_buffer: mass_buffer,
            planet_snapshot_buffer,
            node_buffer,
            candidate_buffer,
            counter_buffer,
            params_buffer,
            integrate_pipeline,
            broad_phase_pipeline,
            integrate_bind_group,
            broad_phase_bind_group_layout,
            broad_phase_bind_group,
            params,
            config: config.clone(),
            node_capacity,
        })
    }

    fn workgroup_count(&self) -> u32 {
        self.params
            .object_count()
            .div_ceil(self.config.workgroup_size)
    }

    /// Advance every object by one Yoshida step
    pub fn integrate(&self) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Integration Encoder"),
            });

        let planet_count = self.params.counts[1] as usize;
        if planet_count > 0 {
            encoder.copy_buffer_to_buffer(
                &self.position_buffer,
                0,
                &self.planet_snapshot_buffer,
                0,
                vec2_bytes(planet_count),
            );
        }

        if self.params.object_count() > 0 {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Integration Compute Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.integrate_pipeline);
            compute_pass.set_bind_group(0, &self.integrate_bind_group, &[]);
            compute_pass.dispatch_workgroups(self.workgroup_count(), 1, 1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Replace the tree used by the next [`GpuSimulation::find_candidates`]
    ///
    /// The tree is trusted to be well formed for the current objects.
    pub fn upload_bvh(&mut self, bvh: &Bvh<Vec2>) {
        let nodes = GpuNode::from_bvh(bvh);
        if nodes.len() > self.node_capacity {
            self.node_capacity = nodes.len().next_power_of_two();
            log::debug!("Growing node buffer to {} nodes", self.node_capacity);
            self.node_buffer = create_node_buffer(&self.device, self.node_capacity);
            self.broad_phase_bind_group = create_broad_phase_bind_group(
                &self.device,
                &self.broad_phase_bind_group_layout,
                [
                    &self.position_buffer,
                    &self.radius_buffer,
                    &self.node_buffer,
                    &self.candidate_buffer,
                    &self.counter_buffer,
                    &self.params_buffer,
                ],
            );
        }
        if !nodes.is_empty() {
            self.queue
                .write_buffer(&self.node_buffer, 0, bytemuck::cast_slice(&nodes));
        }
        self.params.set_tree(bvh.root(), nodes.len() as u32);
        self.write_params();
    }

    /// Query every object against the uploaded tree and read the pairs back
    pub fn find_candidates(&self) -> Result<GpuBroadPhaseOutput> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Broad Phase Encoder"),
            });
        encoder.clear_buffer(&self.counter_buffer, 0, None);
        if self.params.object_count() > 0 {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Broad Phase Compute Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.broad_phase_pipeline);
            compute_pass.set_bind_group(0, &self.broad_phase_bind_group, &[]);
            compute_pass.dispatch_workgroups(self.workgroup_count(), 1, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        let counters: Vec<GpuCounters> = read_buffer(
            &self.device,
            &self.queue,
            &self.counter_buffer,
            std::mem::size_of::<GpuCounters>() as u64,
        )?;
        let counters = counters.first().copied().unwrap_or_default();
        let stored = counters.reserved.min(self.params.candidate_capacity());
        let pairs: Vec<CandidatePair> = read_buffer(
            &self.device,
            &self.queue,
            &self.candidate_buffer,
            u64::from(stored) * std::mem::size_of::<CandidatePair>() as u64,
        )?;

        let report = BroadPhaseReport {
            candidates: pairs.len(),
            stack_overflows: counters.stack_overflows,
            candidate_overflows: counters.candidate_overflows,
        };
        Ok(GpuBroadPhaseOutput {
            pairs,
            report,
            reserved: counters.reserved,
        })
    }

    /// Copy positions and velocities back into `objects`
    pub fn read_objects(&self, objects: &mut ObjectSoa<Vec2>) -> Result<()> {
        self.check_object_count(objects)?;
        let size = vec2_bytes(objects.len());
        let positions: Vec<[f32; 2]> =
            read_buffer(&self.device, &self.queue, &self.position_buffer, size)?;
        let velocities: Vec<[f32; 2]> =
            read_buffer(&self.device, &self.queue, &self.velocity_buffer, size)?;
        objects.positions = positions.into_iter().map(Vec2::from_array).collect();
        objects.velocities = velocities.into_iter().map(Vec2::from_array).collect();
        Ok(())
    }

    /// Overwrite GPU positions and velocities, e.g. after collision resolution
    pub fn write_objects(&self, objects: &ObjectSoa<Vec2>) -> Result<()> {
        self.check_object_count(objects)?;
        if !objects.is_empty() {
            self.queue.write_buffer(
                &self.position_buffer,
                0,
                bytemuck::cast_slice(&vec2_to_arrays(&objects.positions)),
            );
            self.queue.write_buffer(
                &self.velocity_buffer,
                0,
                bytemuck::cast_slice(&vec2_to_arrays(&objects.velocities)),
            );
        }
        Ok(())
    }

    /// Apply new physics parameters; object and tree sizes are kept
    pub fn update_params(&mut self, config: &SimulationConfig) -> Result<()> {
        check_config(config)?;
        if config.max_candidates != self.config.max_candidates
            || config.workgroup_size != self.config.workgroup_size
        {
            return Err(SimulationError::Unsupported(
                "changing max_candidates or workgroup_size requires a new simulation".to_string(),
            ));
        }
        let object_count = self.params.object_count();
        let [_, planet_count, candidate_capacity, _] = self.params.counts;
        let tree = self.params.tree;
        self.params = SimulationParams::from_config(config).with_counts(
            object_count,
            planet_count,
            candidate_capacity,
            gpu_stack_capacity(config, object_count as usize),
        );
        self.params.tree = tree;
        self.config = config.clone();
        self.write_params();
        Ok(())
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn object_count(&self) -> u32 {
        self.params.object_count()
    }

    fn write_params(&self) {
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[self.params]));
    }

    fn check_object_count(&self, objects: &ObjectSoa<Vec2>) -> Result<()> {
        objects.validate()?;
        let expected = self.params.object_count() as usize;
        if objects.len() != expected {
            return Err(PhysicsError::LengthMismatch {
                name: "objects",
                expected,
                actual: objects.len(),
            }
            .into());
        }
        Ok(())
    }
}

/// Bytes of `count` packed `vec2<f32>`
fn vec2_bytes(count: usize) -> u64 {
    (count * std::mem::size_of::<[f32; 2]>()) as u64
}

fn create_node_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    create_storage_buffer(
        device,
        "Node Buffer",
        (capacity * std::mem::size_of::<GpuNode>()) as u64,
        wgpu::BufferUsages::COPY_DST,
    )
}

fn create_pipeline(
    device: &wgpu::Device,
    name: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    workgroup_size: f64,
) -> wgpu::ComputePipeline {
    log::debug!("Creating {name} pipeline...");
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{name} Pipeline Layout")),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{name} Pipeline")),
        layout: Some(&layout),
        module,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions {
            constants: &[("workgroup_size", workgroup_size)],
            ..Default::default()
        },
        cache: None,
    })
}

fn create_broad_phase_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffers: [&wgpu::Buffer; 6],
) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry> = buffers
        .iter()
        .enumerate()
        .map(|(binding, buffer)| wgpu::BindGroupEntry {
            binding: binding as u32,
            resource: buffer.as_entire_binding(),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Broad Phase Bind Group"),
        layout,
        entries: &entries,
    })
}
