//! GPU-facing data shapes (no GPU API binding -- actually standing up a
//! `wgpu::Device`/`Queue`/pipeline is the host's responsibility). Exposes
//! the vertex and instance layouts a host's own wgpu pipeline would bind
//! against, plus a `FrameContext` carrying per-frame bookkeeping. This crate
//! produces CPU-side vertex/index pools (see `layers::LayerDraw`,
//! `labels::GlyphVertex`) and a host uploads them.

pub mod buffer;

/// One frame's bookkeeping, handed to the layer batcher and label engine.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub frame_number: u64,
    pub delta_time_secs: f32,
}

/// General-purpose map vertex: position plus baked-in fill color. Texture
/// coordinates are left out since this crate's draws are either flat-colored
/// (layer batcher) or atlas-sampled with their own dedicated vertex type
/// (`labels::GlyphVertex`).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    /// `wgpu::VertexBufferLayout` a host's own pipeline binds this vertex
    /// against, matching the attribute layout `color` assumes above.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Per-instance transform data, for a host that batches repeated marker-like
/// geometry via instancing.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceData {
    pub transform: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl InstanceData {
    /// `wgpu::VertexBufferLayout` for a host's instanced draw, starting at
    /// `shader_location` 2 so it can coexist with [`Vertex::layout`] in the
    /// same pipeline.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: (std::mem::size_of::<[f32; 4]>() * 2) as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: (std::mem::size_of::<[f32; 4]>() * 3) as wgpu::BufferAddress,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: (std::mem::size_of::<[f32; 4]>() * 4) as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Driver-facing frame counter, incremented once per `render()` call.
#[derive(Debug, Default)]
pub struct FrameClock {
    frame_count: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { frame_count: 0 }
    }

    pub fn begin_frame(&mut self, delta_time_secs: f32) -> FrameContext {
        self.frame_count += 1;
        FrameContext {
            frame_number: self.frame_count,
            delta_time_secs,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_clock_increments() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.begin_frame(0.016).frame_number, 1);
        assert_eq!(clock.begin_frame(0.016).frame_number, 2);
        assert_eq!(clock.frame_count(), 2);
    }

    #[test]
    fn test_vertex_size_matches_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), std::mem::size_of::<[f32; 6]>());
        assert_eq!(Vertex::layout().array_stride, std::mem::size_of::<Vertex>() as u64);
        assert_eq!(Vertex::layout().attributes.len(), 2);
    }

    #[test]
    fn test_instance_layout_array_stride_matches_struct() {
        assert_eq!(InstanceData::layout().array_stride, std::mem::size_of::<InstanceData>() as u64);
        assert_eq!(InstanceData::layout().attributes.len(), 5);
    }
}
