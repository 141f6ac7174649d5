//! Core GPU context abstraction
//!
//! The renderer issues every GPU command through [`GpuContext`]. The trait is a
//! stateful, immediate-mode surface: binds and fixed-function toggles persist
//! until changed, so each pass sets exactly the state it depends on.

use crate::backend::state_cache::BindStateCache;
use crate::backend::types::*;
use crate::viewport::Extent;
use glam::Vec4;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to allocate {0}")]
    AllocationFailed(String),
    #[error("Framebuffer incomplete: {0}")]
    IncompleteFramebuffer(String),
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a framebuffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub(crate) u64);

impl FramebufferHandle {
    /// The window-system provided framebuffer
    pub const DEFAULT: Self = Self(0);

    pub fn is_default(&self) -> bool {
        self.0 == 0
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

impl TextureHandle {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Handle to a renderbuffer (attachment storage that cannot be sampled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderbufferHandle(pub(crate) u64);

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) u64);

/// Handle to a vertex array object (vertex + index buffers and their layout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayHandle(pub(crate) u64);

/// Main GPU context trait
pub trait GpuContext {
    /// Get the context name for debugging
    fn name(&self) -> &'static str;

    // Fixed-function state

    fn set_viewport(&mut self, x: i32, y: i32, extent: Extent);

    fn set_clear_color(&mut self, color: Vec4);

    /// Clear buffers of the currently bound draw framebuffer
    fn clear(&mut self, flags: ClearFlags);

    fn set_depth_enabled(&mut self, enabled: bool);

    fn set_depth_function(&mut self, func: CompareFunction);

    fn set_cull_enabled(&mut self, enabled: bool);

    fn set_face_culling_mode(&mut self, face: CullFace);

    fn set_blend_enabled(&mut self, enabled: bool);

    fn set_blend_equation(&mut self, operation: BlendOperation);

    fn set_blend_function(&mut self, src: BlendFactor, dst: BlendFactor);

    // Framebuffers

    fn create_framebuffer(&mut self, label: Option<&str>) -> BackendResult<FramebufferHandle>;

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);

    /// Bind for both reading and drawing
    fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle);

    fn bind_read_framebuffer(&mut self, framebuffer: FramebufferHandle);

    fn bind_draw_framebuffer(&mut self, framebuffer: FramebufferHandle);

    fn attach_texture(
        &mut self,
        framebuffer: FramebufferHandle,
        point: AttachmentPoint,
        texture: TextureHandle,
    ) -> BackendResult<()>;

    fn attach_renderbuffer(
        &mut self,
        framebuffer: FramebufferHandle,
        point: AttachmentPoint,
        renderbuffer: RenderbufferHandle,
    ) -> BackendResult<()>;

    /// Verify the framebuffer can be rendered to
    fn check_framebuffer(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()>;

    /// Binary copy of the read framebuffer's depth into the draw framebuffer's depth
    fn copy_depth_read_to_draw(&mut self, src: Extent, dst: Extent) -> BackendResult<()>;

    // Textures

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    fn delete_texture(&mut self, texture: TextureHandle);

    fn create_renderbuffer(
        &mut self,
        format: TextureFormat,
        extent: Extent,
    ) -> BackendResult<RenderbufferHandle>;

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle);

    /// Bind a texture to a unit unconditionally
    ///
    /// A bind that takes effect must be recorded in [`GpuContext::bind_cache`];
    /// a rejected one must leave the cache untouched.
    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: TextureHandle);

    /// State cache backing [`GpuContext::lazy_bind_texture`]
    fn bind_cache(&mut self) -> &mut BindStateCache;

    /// Bind a texture unless `unit` already holds it
    fn lazy_bind_texture(&mut self, unit: u32, target: TextureTarget, texture: TextureHandle) {
        if !self.bind_cache().holds(unit, target, texture) {
            self.bind_texture(unit, target, texture);
        }
    }

    // Shaders

    fn create_shader(&mut self, label: &str) -> BackendResult<ShaderHandle>;

    fn delete_shader(&mut self, shader: ShaderHandle);

    fn set_shader(&mut self, shader: ShaderHandle);

    /// Upload a uniform of the currently bound shader
    fn upload_uniform(&mut self, id: UniformId, value: UniformValue);

    // Geometry and draws

    fn create_vertex_array(
        &mut self,
        desc: &VertexArrayDescriptor<'_>,
    ) -> BackendResult<VertexArrayHandle>;

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    /// Draw indexed primitives from the bound vertex array
    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        index_count: u32,
        format: IndexFormat,
        offset: u32,
    );

    /// Draw non-indexed primitives from the bound vertex array
    fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32);
}
