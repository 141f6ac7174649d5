//! Render targets
//!
//! A [`FrameTarget`] owns a framebuffer plus its color and depth attachments,
//! sized relative to the viewport. Resizing always tears every attachment down
//! and allocates new ones; attachments are never resized in place.

mod gbuffer;

pub use gbuffer::*;

use glam::Vec4;

use crate::backend::*;
use crate::error::{RenderError, RenderResult};
use crate::viewport::Extent;

/// Attachment size, absolute or relative to the viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureSize {
    /// Absolute size in pixels
    Absolute { width: u32, height: u32 },
    /// Relative to viewport size (1.0 = full size)
    Relative { width_scale: f32, height_scale: f32 },
}

impl Default for TextureSize {
    fn default() -> Self {
        TextureSize::Relative {
            width_scale: 1.0,
            height_scale: 1.0,
        }
    }
}

impl TextureSize {
    pub fn uniform(scale: f32) -> Self {
        TextureSize::Relative {
            width_scale: scale,
            height_scale: scale,
        }
    }

    /// Pixel size for a given viewport, never below 1x1
    pub fn resolve(&self, viewport: Extent) -> Extent {
        let (width, height) = match self {
            TextureSize::Absolute { width, height } => (*width, *height),
            TextureSize::Relative {
                width_scale,
                height_scale,
            } => (
                ((viewport.width as f32) * width_scale) as u32,
                ((viewport.height as f32) * height_scale) as u32,
            ),
        };
        Extent::new(width.max(1), height.max(1))
    }
}

/// How a target stores depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthAttachment {
    None,
    /// Depth that can only be tested against and copied
    Renderbuffer(TextureFormat),
    /// Depth that later passes sample
    Texture(TextureFormat),
}

/// Frame target descriptor
#[derive(Debug, Clone)]
pub struct FrameTargetDescriptor {
    pub label: String,
    pub color_format: TextureFormat,
    pub color_attachments: u32,
    pub depth: DepthAttachment,
    pub sampler: SamplerDescriptor,
    pub size: TextureSize,
}

impl FrameTargetDescriptor {
    /// One full-size color attachment with a depth renderbuffer
    pub fn color(label: &str, format: TextureFormat) -> Self {
        Self {
            label: label.to_string(),
            color_format: format,
            color_attachments: 1,
            depth: DepthAttachment::Renderbuffer(TextureFormat::Depth24),
            sampler: SamplerDescriptor::default(),
            size: TextureSize::default(),
        }
    }

    pub fn with_color_attachments(mut self, count: u32) -> Self {
        self.color_attachments = count;
        self
    }

    pub fn with_depth(mut self, depth: DepthAttachment) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerDescriptor) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_size(mut self, size: TextureSize) -> Self {
        self.size = size;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepthStorage {
    Texture(TextureHandle),
    Renderbuffer(RenderbufferHandle),
}

#[derive(Debug)]
struct Allocation {
    framebuffer: Option<FramebufferHandle>,
    colors: Vec<TextureHandle>,
    depth: Option<DepthStorage>,
    extent: Extent,
}

impl Allocation {
    fn empty(extent: Extent) -> Self {
        Self {
            framebuffer: None,
            colors: Vec::new(),
            depth: None,
            extent,
        }
    }

    fn release(self, ctx: &mut dyn GpuContext) {
        for texture in self.colors {
            ctx.delete_texture(texture);
        }
        match self.depth {
            Some(DepthStorage::Texture(texture)) => ctx.delete_texture(texture),
            Some(DepthStorage::Renderbuffer(renderbuffer)) => ctx.delete_renderbuffer(renderbuffer),
            None => {}
        }
        if let Some(framebuffer) = self.framebuffer {
            ctx.delete_framebuffer(framebuffer);
        }
    }
}

#[derive(Debug)]
enum TargetState {
    Uninitialized,
    Ready(Allocation),
    Invalid,
}

/// An offscreen render target
#[derive(Debug)]
pub struct FrameTarget {
    desc: FrameTargetDescriptor,
    state: TargetState,
    clear_color: Vec4,
}

impl FrameTarget {
    pub fn new(desc: FrameTargetDescriptor) -> Self {
        Self {
            desc,
            state: TargetState::Uninitialized,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
        }
    }

    pub fn with_clear_color(mut self, color: Vec4) -> Self {
        self.clear_color = color;
        self
    }

    pub fn label(&self) -> &str {
        &self.desc.label
    }

    pub fn descriptor(&self) -> &FrameTargetDescriptor {
        &self.desc
    }

    /// Allocate attachments for `viewport`, releasing any previous ones first
    ///
    /// On failure everything allocated so far is released and the target is
    /// left invalid.
    pub fn initialize(&mut self, ctx: &mut dyn GpuContext, viewport: Extent) -> RenderResult<()> {
        self.release(ctx);

        let extent = self.desc.size.resolve(viewport);
        let mut allocation = Allocation::empty(extent);
        match Self::allocate(ctx, &self.desc, &mut allocation) {
            Ok(()) => {
                log::debug!(
                    "Initialized {} at {}x{}",
                    self.desc.label,
                    extent.width,
                    extent.height
                );
                self.state = TargetState::Ready(allocation);
                Ok(())
            }
            Err(source) => {
                log::error!("Failed to allocate {}: {}", self.desc.label, source);
                allocation.release(ctx);
                self.state = TargetState::Invalid;
                Err(RenderError::GpuResource {
                    target: self.desc.label.clone(),
                    source,
                })
            }
        }
    }

    fn allocate(
        ctx: &mut dyn GpuContext,
        desc: &FrameTargetDescriptor,
        allocation: &mut Allocation,
    ) -> BackendResult<()> {
        let extent = allocation.extent;
        let framebuffer = ctx.create_framebuffer(Some(&desc.label))?;
        allocation.framebuffer = Some(framebuffer);

        for index in 0..desc.color_attachments {
            let texture = ctx.create_texture(&TextureDescriptor {
                label: Some(format!("{} color {}", desc.label, index)),
                width: extent.width,
                height: extent.height,
                mip_levels: 1,
                target: TextureTarget::Texture2D,
                format: desc.color_format,
                usage: TextureUsage::ATTACHMENT | TextureUsage::SAMPLED,
                sampler: desc.sampler.clone(),
            })?;
            allocation.colors.push(texture);
            ctx.attach_texture(framebuffer, AttachmentPoint::Color(index), texture)?;
        }

        match desc.depth {
            DepthAttachment::None => {}
            DepthAttachment::Renderbuffer(format) => {
                let renderbuffer = ctx.create_renderbuffer(format, extent)?;
                allocation.depth = Some(DepthStorage::Renderbuffer(renderbuffer));
                ctx.attach_renderbuffer(framebuffer, AttachmentPoint::Depth, renderbuffer)?;
            }
            DepthAttachment::Texture(format) => {
                let texture = ctx.create_texture(&TextureDescriptor {
                    label: Some(format!("{} depth", desc.label)),
                    width: extent.width,
                    height: extent.height,
                    mip_levels: 1,
                    target: TextureTarget::Texture2D,
                    format,
                    usage: TextureUsage::ATTACHMENT | TextureUsage::SAMPLED,
                    sampler: SamplerDescriptor::nearest(),
                })?;
                allocation.depth = Some(DepthStorage::Texture(texture));
                ctx.attach_texture(framebuffer, AttachmentPoint::Depth, texture)?;
            }
        }

        ctx.check_framebuffer(framebuffer)
    }

    /// Release and reallocate at a new viewport size; safe before the first initialize
    pub fn reset(&mut self, ctx: &mut dyn GpuContext, viewport: Extent) -> RenderResult<()> {
        self.initialize(ctx, viewport)
    }

    /// Delete every owned GPU object; calling it again is a no-op
    pub fn release(&mut self, ctx: &mut dyn GpuContext) {
        if let TargetState::Ready(allocation) =
            std::mem::replace(&mut self.state, TargetState::Uninitialized)
        {
            allocation.release(ctx);
        }
    }

    /// Bind as the draw target, optionally clearing it
    ///
    /// Changes the context's framebuffer binding; callers must not rely on the
    /// previous binding afterwards.
    pub fn enable(&self, ctx: &mut dyn GpuContext, clear: bool) -> RenderResult<()> {
        let allocation = self.ready()?;
        let Some(framebuffer) = allocation.framebuffer else {
            return Err(RenderError::InvalidTarget(self.desc.label.clone()));
        };
        ctx.bind_framebuffer(framebuffer);
        if clear {
            let flags = if allocation.depth.is_some() {
                ClearFlags::COLOR_DEPTH
            } else {
                ClearFlags::COLOR
            };
            ctx.set_clear_color(self.clear_color);
            ctx.clear(flags);
        }
        Ok(())
    }

    /// Binary copy of this target's depth into `dst`'s depth
    pub fn copy_depth_to(&self, ctx: &mut dyn GpuContext, dst: &FrameTarget) -> RenderResult<()> {
        let (src_fb, src_extent) = self.framebuffer_and_extent()?;
        let (dst_fb, dst_extent) = dst.framebuffer_and_extent()?;
        ctx.bind_read_framebuffer(src_fb);
        ctx.bind_draw_framebuffer(dst_fb);
        ctx.copy_depth_read_to_draw(src_extent, dst_extent)?;
        Ok(())
    }

    fn ready(&self) -> RenderResult<&Allocation> {
        match &self.state {
            TargetState::Ready(allocation) => Ok(allocation),
            TargetState::Uninitialized | TargetState::Invalid => {
                Err(RenderError::InvalidTarget(self.desc.label.clone()))
            }
        }
    }

    fn framebuffer_and_extent(&self) -> RenderResult<(FramebufferHandle, Extent)> {
        let allocation = self.ready()?;
        allocation
            .framebuffer
            .map(|fb| (fb, allocation.extent))
            .ok_or_else(|| RenderError::InvalidTarget(self.desc.label.clone()))
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.state, TargetState::Ready(_))
    }

    /// True after an allocation failure, until the next successful initialize
    pub fn is_invalid(&self) -> bool {
        matches!(self.state, TargetState::Invalid)
    }

    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.ready().ok()?.framebuffer
    }

    pub fn extent(&self) -> Option<Extent> {
        self.ready().ok().map(|a| a.extent)
    }

    pub fn color_texture(&self, index: usize) -> Option<TextureHandle> {
        self.ready().ok()?.colors.get(index).copied()
    }

    pub fn color_textures(&self) -> &[TextureHandle] {
        match &self.state {
            TargetState::Ready(allocation) => &allocation.colors,
            _ => &[],
        }
    }

    /// Depth attachment when it was created as a sampleable texture
    pub fn depth_texture(&self) -> Option<TextureHandle> {
        match self.ready().ok()?.depth {
            Some(DepthStorage::Texture(texture)) => Some(texture),
            _ => None,
        }
    }
}
