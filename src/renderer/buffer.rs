//! Host-GPU-agnostic buffer staging.
//!
//! This crate holds no GPU API binding of its own, so `BufferManager` tracks
//! CPU-side byte blobs plus their `BufferInfo` metadata instead of owning
//! actual `wgpu::Buffer`s. A host walks `StagedBuffer::bytes()` and uploads
//! to its own GPU buffers however it sees fit (`write_buffer`, a staging
//! belt, etc).

use std::collections::HashMap;

use crate::error::{Result, TessError};

/// Handle for referencing a staged buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

/// Kind of buffer staged, for host-side dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
}

/// Metadata about one staged buffer.
#[derive(Debug, Clone)]
pub struct BufferInfo {
    pub kind: BufferKind,
    pub size_bytes: usize,
    pub element_count: usize,
    pub dynamic: bool,
}

struct StagedBuffer {
    bytes: Vec<u8>,
    info: BufferInfo,
}

/// Tracks staged vertex/index/uniform byte blobs across a frame.
pub struct BufferManager {
    buffers: HashMap<BufferHandle, StagedBuffer>,
    next_handle_id: u64,
}

impl BufferManager {
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
            next_handle_id: 0,
        }
    }

    pub fn stage_vertices<T: bytemuck::Pod>(&mut self, data: &[T], dynamic: bool) -> BufferHandle {
        let bytes = bytemuck::cast_slice(data).to_vec();
        let info = BufferInfo {
            kind: BufferKind::Vertex,
            size_bytes: bytes.len(),
            element_count: data.len(),
            dynamic,
        };
        self.insert(bytes, info)
    }

    pub fn stage_indices(&mut self, indices: &[u32], dynamic: bool) -> BufferHandle {
        let bytes = bytemuck::cast_slice(indices).to_vec();
        let info = BufferInfo {
            kind: BufferKind::Index,
            size_bytes: bytes.len(),
            element_count: indices.len(),
            dynamic,
        };
        self.insert(bytes, info)
    }

    pub fn stage_uniform<T: bytemuck::Pod>(&mut self, data: &T) -> BufferHandle {
        let bytes = bytemuck::bytes_of(data).to_vec();
        let info = BufferInfo {
            kind: BufferKind::Uniform,
            size_bytes: bytes.len(),
            element_count: 1,
            dynamic: true,
        };
        self.insert(bytes, info)
    }

    fn insert(&mut self, bytes: Vec<u8>, info: BufferInfo) -> BufferHandle {
        let handle = BufferHandle(self.next_handle_id);
        self.next_handle_id += 1;
        self.buffers.insert(handle, StagedBuffer { bytes, info });
        handle
    }

    /// Updates an existing dynamic buffer's bytes in place.
    pub fn update<T: bytemuck::Pod>(&mut self, handle: BufferHandle, data: &[T]) -> Result<()> {
        let staged = self
            .buffers
            .get_mut(&handle)
            .ok_or_else(|| TessError::InvalidConfig("unknown buffer handle".into()))?;
        if !staged.info.dynamic {
            return Err(TessError::InvalidConfig("cannot update a static buffer".into()));
        }
        staged.bytes = bytemuck::cast_slice(data).to_vec();
        staged.info.size_bytes = staged.bytes.len();
        staged.info.element_count = data.len();
        Ok(())
    }

    pub fn bytes(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&handle).map(|b| b.bytes.as_slice())
    }

    pub fn info(&self, handle: BufferHandle) -> Option<&BufferInfo> {
        self.buffers.get(&handle).map(|b| &b.info)
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    pub fn stats(&self) -> BufferStats {
        let mut stats = BufferStats::default();
        for staged in self.buffers.values() {
            match staged.info.kind {
                BufferKind::Vertex => {
                    stats.vertex_count += 1;
                    stats.vertex_bytes += staged.info.size_bytes;
                }
                BufferKind::Index => {
                    stats.index_count += 1;
                    stats.index_bytes += staged.info.size_bytes;
                }
                BufferKind::Uniform => {
                    stats.uniform_count += 1;
                    stats.uniform_bytes += staged.info.size_bytes;
                }
            }
        }
        stats
    }
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate staging statistics, for host-side profiling.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferStats {
    pub vertex_count: usize,
    pub vertex_bytes: usize,
    pub index_count: usize,
    pub index_bytes: usize,
    pub uniform_count: usize,
    pub uniform_bytes: usize,
}
