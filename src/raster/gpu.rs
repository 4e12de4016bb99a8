use std::collections::HashMap;

use crate::foundation::error::{DepthError, DepthResult};
use crate::foundation::grid::{CHANNELS, PixelGrid};
use crate::raster::backend::{BackendKind, RasterBackend};
use crate::raster::program::RasterProgram;

struct CachedPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// `wgpu` backend: each program becomes a full-screen render pipeline drawing into an
/// `Rgba8Unorm` target, read back row by row.
///
/// Pipelines are cached by [`RasterProgram::fingerprint`].
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: HashMap<u64, CachedPipeline>,
}

impl GpuBackend {
    /// Acquire an adapter and device.
    ///
    /// Fails with a backend error containing `no gpu adapter available` on machines without one.
    pub fn new() -> DepthResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                DepthError::backend("no gpu adapter available")
            }
            other => DepthError::backend(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("normal_depth_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| DepthError::backend(format!("wgpu request_device failed: {e:?}")))?;

        tracing::debug!(adapter = ?adapter.get_info().name, "gpu raster backend ready");
        Ok(Self {
            device,
            queue,
            pipelines: HashMap::new(),
        })
    }

    fn ensure_pipeline(&mut self, program: &RasterProgram) -> DepthResult<()> {
        let key = program.fingerprint();
        if !self.pipelines.contains_key(&key) {
            let cached = self.build_pipeline(program)?;
            self.pipelines.insert(key, cached);
        }
        Ok(())
    }

    fn build_pipeline(&self, program: &RasterProgram) -> DepthResult<CachedPipeline> {
        let device = &self.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("normal_depth_vs"),
            source: wgpu::ShaderSource::Wgsl(program.vertex_source().into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("normal_depth_fs"),
            source: wgpu::ShaderSource::Wgsl(program.fragment_source().into()),
        });

        let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..program.input_count() as u32)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                },
                count: None,
            })
            .collect();
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("normal_depth_inputs"),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("normal_depth_pl"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("normal_depth_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some("vs"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some("fs"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(DepthError::backend(format!(
                "raster program failed to compile: {err}"
            )));
        }
        tracing::debug!(
            fingerprint = program.fingerprint(),
            inputs = program.input_count(),
            "built gpu raster pipeline"
        );
        Ok(CachedPipeline {
            pipeline,
            bind_group_layout,
        })
    }

    fn upload(&self, grid: &PixelGrid) -> wgpu::TextureView {
        let size = extent(grid.width(), grid.height());
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("normal_depth_input"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            grid.data(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(grid.width() * CHANNELS as u32),
                rows_per_image: Some(grid.height()),
            },
            size,
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }
}

impl RasterBackend for GpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    #[tracing::instrument(skip_all, fields(w = program.width(), h = program.height()))]
    fn execute(
        &mut self,
        program: &RasterProgram,
        inputs: &[&PixelGrid],
    ) -> DepthResult<PixelGrid> {
        let (width, height) = (program.width(), program.height());
        if inputs.len() != program.input_count() {
            return Err(DepthError::validation(format!(
                "program samples {} inputs, {} bound",
                program.input_count(),
                inputs.len()
            )));
        }
        if inputs
            .iter()
            .any(|g| g.width() != width || g.height() != height)
        {
            return Err(DepthError::validation(format!(
                "input size differs from raster target {width}x{height}"
            )));
        }
        if width == 0 || height == 0 {
            return PixelGrid::new(width, height, Vec::new());
        }

        let views: Vec<wgpu::TextureView> = inputs.iter().map(|g| self.upload(g)).collect();
        self.ensure_pipeline(program)?;
        let cached = self
            .pipelines
            .get(&program.fingerprint())
            .ok_or_else(|| DepthError::backend("pipeline cache miss"))?;
        let device = &self.device;

        let entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("normal_depth_inputs"),
            layout: &cached.bind_group_layout,
            entries: &entries,
        });

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("normal_depth_target"),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let bytes_per_row_unpadded = width
            .checked_mul(CHANNELS as u32)
            .ok_or_else(|| DepthError::backend("render target width overflow"))?;
        let bytes_per_row = align_to(bytes_per_row_unpadded, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer_size = u64::from(bytes_per_row)
            .checked_mul(u64::from(height))
            .ok_or_else(|| DepthError::backend("readback buffer size overflow"))?;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("normal_depth_readback"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("normal_depth_encoder"),
        });
        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("normal_depth_rp"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_pipeline(&cached.pipeline);
            rp.set_bind_group(0, &bind_group, &[]);
            rp.draw(0..3, 0..1);
        }
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            extent(width, height),
        );
        self.queue.submit(Some(encoder.finish()));
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(DepthError::backend(format!("raster pass failed: {err}")));
        }

        let buffer_slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| DepthError::backend(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| DepthError::backend("readback channel closed"))?
            .map_err(|e| DepthError::backend(format!("readback map failed: {e:?}")))?;

        let mapped = buffer_slice.get_mapped_range();
        let row_bytes = bytes_per_row_unpadded as usize;
        let padded_row_bytes = bytes_per_row as usize;
        let mut out = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * padded_row_bytes;
            out.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        drop(mapped);
        readback.unmap();

        PixelGrid::new(width, height, out)
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}
