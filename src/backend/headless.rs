//! Headless GPU context for testing and offline use.
//!
//! This context performs no rasterization. It keeps a faithful model of every
//! object the renderer creates (framebuffers, attachments, programs, vertex
//! arrays), tracks bind state exactly as a stateful graphics API would, stores
//! depth attachments as plain `f32` images so depth copies can be inspected, and
//! records every draw call together with the state it executed with.

use std::collections::{BTreeMap, HashMap, HashSet};

use glam::Vec4;

use super::state_cache::BindStateCache;
use super::traits::*;
use super::types::*;
use crate::viewport::Extent;

/// Where a framebuffer attachment's storage lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentRef {
    Texture(TextureHandle),
    Renderbuffer(RenderbufferHandle),
}

impl AttachmentRef {
    fn image_id(&self) -> u64 {
        match self {
            AttachmentRef::Texture(t) => t.0,
            AttachmentRef::Renderbuffer(r) => r.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageKind {
    Texture,
    Renderbuffer,
}

#[derive(Debug)]
struct Image {
    label: Option<String>,
    kind: ImageKind,
    target: TextureTarget,
    format: TextureFormat,
    extent: Extent,
    depth: Option<Vec<f32>>,
}

impl Image {
    fn new(
        label: Option<String>,
        kind: ImageKind,
        target: TextureTarget,
        format: TextureFormat,
        extent: Extent,
    ) -> Self {
        let depth = format
            .is_depth()
            .then(|| vec![1.0; extent.pixel_count()]);
        Self {
            label,
            kind,
            target,
            format,
            extent,
            depth,
        }
    }
}

#[derive(Debug, Default)]
struct FramebufferObject {
    label: Option<String>,
    colors: BTreeMap<u32, AttachmentRef>,
    depth: Option<AttachmentRef>,
}

impl FramebufferObject {
    fn attachments(&self) -> impl Iterator<Item = (AttachmentPoint, AttachmentRef)> + '_ {
        self.colors
            .iter()
            .map(|(index, a)| (AttachmentPoint::Color(*index), *a))
            .chain(self.depth.map(|a| (AttachmentPoint::Depth, a)))
    }
}

#[derive(Debug)]
struct ShaderObject {
    label: String,
    uniforms: HashMap<UniformId, UniformValue>,
}

#[derive(Debug)]
struct VertexArrayObject {
    label: Option<String>,
    vertex_count: u64,
    index_count: Option<u32>,
}

/// A recorded draw call
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub shader: Option<ShaderHandle>,
    pub shader_label: Option<String>,
    pub framebuffer: FramebufferHandle,
    pub vertex_array: Option<VertexArrayHandle>,
    pub topology: PrimitiveTopology,
    pub count: u32,
    pub indexed: bool,
    pub state: RasterState,
    pub uniforms: HashMap<UniformId, UniformValue>,
}

impl DrawCall {
    pub fn uniform(&self, id: UniformId) -> Option<UniformValue> {
        self.uniforms.get(&id).copied()
    }
}

/// Allocation failure injection
#[derive(Debug, Clone, Default)]
enum FailurePolicy {
    #[default]
    Never,
    /// Fail textures and framebuffers whose label contains the pattern
    Labelled(String),
    /// Let `n` more allocations succeed, then fail every one after
    After(usize),
}

/// Headless GPU context
#[derive(Debug)]
pub struct HeadlessContext {
    next_handle: u64,
    default_extent: Extent,
    state: RasterState,
    clear_color: Vec4,
    viewport: (i32, i32, Extent),
    read_framebuffer: FramebufferHandle,
    draw_framebuffer: FramebufferHandle,
    framebuffers: HashMap<u64, FramebufferObject>,
    images: HashMap<u64, Image>,
    shaders: HashMap<u64, ShaderObject>,
    vertex_arrays: HashMap<u64, VertexArrayObject>,
    current_shader: Option<ShaderHandle>,
    current_vertex_array: Option<VertexArrayHandle>,
    texture_units: HashMap<u32, (TextureTarget, TextureHandle)>,
    cache: BindStateCache,
    failure: FailurePolicy,
    draws: Vec<DrawCall>,
    clears: Vec<(FramebufferHandle, ClearFlags)>,
    texture_binds: usize,
    violations: Vec<String>,
}

impl HeadlessContext {
    /// Create a context whose default framebuffer has the given size
    pub fn new(default_extent: Extent) -> Self {
        let mut ctx = Self {
            next_handle: 1,
            default_extent,
            state: RasterState::default(),
            clear_color: Vec4::ZERO,
            viewport: (0, 0, default_extent),
            read_framebuffer: FramebufferHandle::DEFAULT,
            draw_framebuffer: FramebufferHandle::DEFAULT,
            framebuffers: HashMap::new(),
            images: HashMap::new(),
            shaders: HashMap::new(),
            vertex_arrays: HashMap::new(),
            current_shader: None,
            current_vertex_array: None,
            texture_units: HashMap::new(),
            cache: BindStateCache::new(),
            failure: FailurePolicy::Never,
            draws: Vec::new(),
            clears: Vec::new(),
            texture_binds: 0,
            violations: Vec::new(),
        };

        // the window-system framebuffer owns a depth buffer like a real swapchain
        let depth_id = ctx.allocate_id();
        ctx.images.insert(
            depth_id,
            Image::new(
                Some("default depth".into()),
                ImageKind::Renderbuffer,
                TextureTarget::Texture2D,
                TextureFormat::Depth24,
                default_extent,
            ),
        );
        ctx.framebuffers.insert(
            FramebufferHandle::DEFAULT.0,
            FramebufferObject {
                label: Some("default".into()),
                colors: BTreeMap::new(),
                depth: Some(AttachmentRef::Renderbuffer(RenderbufferHandle(depth_id))),
            },
        );
        ctx
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    fn check_allocation(&mut self, what: &str, label: Option<&str>) -> BackendResult<()> {
        let fail = match &mut self.failure {
            FailurePolicy::Never => false,
            FailurePolicy::Labelled(pattern) => {
                label.is_some_and(|l| l.contains(pattern.as_str()))
            }
            FailurePolicy::After(remaining) => {
                if *remaining == 0 {
                    true
                } else {
                    *remaining -= 1;
                    false
                }
            }
        };
        if fail {
            log::trace!("HeadlessContext: injected failure for {} {:?}", what, label);
            return Err(BackendError::AllocationFailed(format!(
                "{} {}",
                what,
                label.unwrap_or("<unnamed>")
            )));
        }
        Ok(())
    }

    fn violation(&mut self, message: String) {
        log::error!("HeadlessContext: {}", message);
        self.violations.push(message);
    }

    fn framebuffer_extent(&self, framebuffer: FramebufferHandle) -> Option<Extent> {
        let fbo = self.framebuffers.get(&framebuffer.0)?;
        fbo.attachments()
            .find_map(|(_, a)| self.images.get(&a.image_id()).map(|i| i.extent))
    }

    fn framebuffer_complete(&self, framebuffer: FramebufferHandle) -> Result<(), String> {
        let Some(fbo) = self.framebuffers.get(&framebuffer.0) else {
            return Err(format!("framebuffer {} does not exist", framebuffer.0));
        };
        let mut extent = None;
        let mut any = false;
        for (point, attachment) in fbo.attachments() {
            any = true;
            let Some(image) = self.images.get(&attachment.image_id()) else {
                return Err(format!("{:?} references a deleted image", point));
            };
            match extent {
                None => extent = Some(image.extent),
                Some(e) if e != image.extent => {
                    return Err(format!(
                        "{:?} is {}x{}, expected {}x{}",
                        point, image.extent.width, image.extent.height, e.width, e.height
                    ));
                }
                Some(_) => {}
            }
        }
        if !any {
            return Err("no attachments".into());
        }
        Ok(())
    }

    fn depth_image_mut(&mut self, framebuffer: FramebufferHandle) -> Option<&mut Image> {
        let id = self.framebuffers.get(&framebuffer.0)?.depth?.image_id();
        self.images.get_mut(&id)
    }

    // Failure injection

    /// Fail every texture/framebuffer allocation whose label contains `pattern`
    pub fn fail_allocations_labelled(&mut self, pattern: &str) {
        self.failure = FailurePolicy::Labelled(pattern.to_string());
    }

    /// Allow `successes` more allocations, then fail all of them
    pub fn fail_allocations_after(&mut self, successes: usize) {
        self.failure = FailurePolicy::After(successes);
    }

    pub fn clear_failures(&mut self) {
        self.failure = FailurePolicy::Never;
    }

    // Inspection

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Draw calls issued while the shader created with `label` was bound
    pub fn draws_with_shader(&self, label: &str) -> usize {
        self.draws
            .iter()
            .filter(|d| d.shader_label.as_deref() == Some(label))
            .count()
    }

    /// Draw calls issued into `framebuffer`
    pub fn draws_into(&self, framebuffer: FramebufferHandle) -> usize {
        self.draws
            .iter()
            .filter(|d| d.framebuffer == framebuffer)
            .count()
    }

    pub fn clears(&self) -> &[(FramebufferHandle, ClearFlags)] {
        &self.clears
    }

    /// Forget recorded draws, clears and bind counters (objects stay alive)
    pub fn reset_frame_log(&mut self) {
        self.draws.clear();
        self.clears.clear();
        self.texture_binds = 0;
    }

    /// API misuse detected so far (feedback loops, incomplete targets, dead handles)
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Number of texture binds actually issued (lazy binds that were skipped are not counted)
    pub fn texture_bind_count(&self) -> usize {
        self.texture_binds
    }

    pub fn live_texture_count(&self) -> usize {
        self.images
            .values()
            .filter(|i| i.kind == ImageKind::Texture)
            .count()
    }

    /// Live renderbuffers, not counting the default framebuffer's depth
    pub fn live_renderbuffer_count(&self) -> usize {
        self.images
            .values()
            .filter(|i| i.kind == ImageKind::Renderbuffer)
            .count()
            - 1
    }

    /// Live framebuffers, not counting the default framebuffer
    pub fn live_framebuffer_count(&self) -> usize {
        self.framebuffers.len() - 1
    }

    pub fn is_texture_alive(&self, texture: TextureHandle) -> bool {
        self.images
            .get(&texture.0)
            .is_some_and(|i| i.kind == ImageKind::Texture)
    }

    pub fn texture_extent(&self, texture: TextureHandle) -> Option<Extent> {
        self.images
            .get(&texture.0)
            .filter(|i| i.kind == ImageKind::Texture)
            .map(|i| i.extent)
    }

    pub fn texture_label(&self, texture: TextureHandle) -> Option<&str> {
        self.images.get(&texture.0)?.label.as_deref()
    }

    /// Extent of every attachment of `framebuffer`
    pub fn attachment_extents(&self, framebuffer: FramebufferHandle) -> Vec<(AttachmentPoint, Extent)> {
        let Some(fbo) = self.framebuffers.get(&framebuffer.0) else {
            return Vec::new();
        };
        fbo.attachments()
            .filter_map(|(point, a)| self.images.get(&a.image_id()).map(|i| (point, i.extent)))
            .collect()
    }

    /// Textures currently bound to any unit
    pub fn bound_textures(&self) -> Vec<TextureHandle> {
        self.texture_units.values().map(|(_, t)| *t).collect()
    }

    pub fn bound_draw_framebuffer(&self) -> FramebufferHandle {
        self.draw_framebuffer
    }

    pub fn raster_state(&self) -> RasterState {
        self.state
    }

    pub fn viewport(&self) -> (i32, i32, Extent) {
        self.viewport
    }

    pub fn current_shader_label(&self) -> Option<&str> {
        let shader = self.current_shader?;
        self.shaders.get(&shader.0).map(|s| s.label.as_str())
    }

    /// Last value uploaded to `id` on the bound shader
    pub fn uniform(&self, id: UniformId) -> Option<UniformValue> {
        let shader = self.current_shader?;
        self.shaders.get(&shader.0)?.uniforms.get(&id).copied()
    }

    pub fn clear_color(&self) -> Vec4 {
        self.clear_color
    }

    /// Depth contents of `framebuffer`'s depth attachment, row major
    pub fn depth_values(&self, framebuffer: FramebufferHandle) -> Option<Vec<f32>> {
        let id = self.framebuffers.get(&framebuffer.0)?.depth?.image_id();
        self.images.get(&id)?.depth.clone()
    }

    /// Overwrite `framebuffer`'s depth attachment, standing in for rasterized geometry
    pub fn fill_depth(&mut self, framebuffer: FramebufferHandle, f: impl Fn(u32, u32) -> f32) {
        let Some(image) = self.depth_image_mut(framebuffer) else {
            return;
        };
        let width = image.extent.width;
        if let Some(depth) = image.depth.as_mut() {
            for (i, value) in depth.iter_mut().enumerate() {
                let i = i as u32;
                *value = f(i % width, i / width);
            }
        }
    }

    pub fn default_extent(&self) -> Extent {
        self.default_extent
    }
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new(Extent::new(1280, 720))
    }
}

impl GpuContext for HeadlessContext {
    fn name(&self) -> &'static str {
        "Headless"
    }

    fn set_viewport(&mut self, x: i32, y: i32, extent: Extent) {
        self.viewport = (x, y, extent);
    }

    fn set_clear_color(&mut self, color: Vec4) {
        self.clear_color = color;
    }

    fn clear(&mut self, flags: ClearFlags) {
        let framebuffer = self.draw_framebuffer;
        if let Err(reason) = self.framebuffer_complete(framebuffer) {
            self.violation(format!("clear on incomplete framebuffer: {}", reason));
            return;
        }
        if flags.contains(ClearFlags::DEPTH) {
            if let Some(depth) = self.depth_image_mut(framebuffer).and_then(|i| i.depth.as_mut()) {
                depth.fill(1.0);
            }
        }
        self.clears.push((framebuffer, flags));
    }

    fn set_depth_enabled(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    fn set_depth_function(&mut self, func: CompareFunction) {
        self.state.depth_compare = func;
    }

    fn set_cull_enabled(&mut self, enabled: bool) {
        self.state.cull_enabled = enabled;
    }

    fn set_face_culling_mode(&mut self, face: CullFace) {
        self.state.cull_face = face;
    }

    fn set_blend_enabled(&mut self, enabled: bool) {
        self.state.blend_enabled = enabled;
    }

    fn set_blend_equation(&mut self, operation: BlendOperation) {
        self.state.blend_operation = operation;
    }

    fn set_blend_function(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.state.blend_src = src;
        self.state.blend_dst = dst;
    }

    fn create_framebuffer(&mut self, label: Option<&str>) -> BackendResult<FramebufferHandle> {
        self.check_allocation("framebuffer", label)?;
        let id = self.allocate_id();
        log::trace!("HeadlessContext: creating framebuffer {:?} ({})", label, id);
        self.framebuffers.insert(
            id,
            FramebufferObject {
                label: label.map(str::to_string),
                ..Default::default()
            },
        );
        Ok(FramebufferHandle(id))
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if framebuffer.is_default() {
            return;
        }
        if let Some(fbo) = self.framebuffers.remove(&framebuffer.0) {
            log::trace!("HeadlessContext: deleting framebuffer {:?}", fbo.label);
        }
        if self.read_framebuffer == framebuffer {
            self.read_framebuffer = FramebufferHandle::DEFAULT;
        }
        if self.draw_framebuffer == framebuffer {
            self.draw_framebuffer = FramebufferHandle::DEFAULT;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.bind_read_framebuffer(framebuffer);
        self.bind_draw_framebuffer(framebuffer);
    }

    fn bind_read_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if !self.framebuffers.contains_key(&framebuffer.0) {
            self.violation(format!("binding deleted framebuffer {}", framebuffer.0));
        }
        self.read_framebuffer = framebuffer;
    }

    fn bind_draw_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if !self.framebuffers.contains_key(&framebuffer.0) {
            self.violation(format!("binding deleted framebuffer {}", framebuffer.0));
        }
        self.draw_framebuffer = framebuffer;
    }

    fn attach_texture(
        &mut self,
        framebuffer: FramebufferHandle,
        point: AttachmentPoint,
        texture: TextureHandle,
    ) -> BackendResult<()> {
        if !self.is_texture_alive(texture) {
            return Err(BackendError::InvalidHandle(format!("texture {}", texture.0)));
        }
        let fbo = self
            .framebuffers
            .get_mut(&framebuffer.0)
            .filter(|_| !framebuffer.is_default())
            .ok_or_else(|| BackendError::InvalidHandle(format!("framebuffer {}", framebuffer.0)))?;
        match point {
            AttachmentPoint::Color(index) => {
                fbo.colors.insert(index, AttachmentRef::Texture(texture));
            }
            AttachmentPoint::Depth => fbo.depth = Some(AttachmentRef::Texture(texture)),
        }
        Ok(())
    }

    fn attach_renderbuffer(
        &mut self,
        framebuffer: FramebufferHandle,
        point: AttachmentPoint,
        renderbuffer: RenderbufferHandle,
    ) -> BackendResult<()> {
        let alive = self
            .images
            .get(&renderbuffer.0)
            .is_some_and(|i| i.kind == ImageKind::Renderbuffer);
        if !alive {
            return Err(BackendError::InvalidHandle(format!(
                "renderbuffer {}",
                renderbuffer.0
            )));
        }
        let fbo = self
            .framebuffers
            .get_mut(&framebuffer.0)
            .filter(|_| !framebuffer.is_default())
            .ok_or_else(|| BackendError::InvalidHandle(format!("framebuffer {}", framebuffer.0)))?;
        match point {
            AttachmentPoint::Color(index) => {
                fbo.colors
                    .insert(index, AttachmentRef::Renderbuffer(renderbuffer));
            }
            AttachmentPoint::Depth => fbo.depth = Some(AttachmentRef::Renderbuffer(renderbuffer)),
        }
        Ok(())
    }

    fn check_framebuffer(&mut self, framebuffer: FramebufferHandle) -> BackendResult<()> {
        self.framebuffer_complete(framebuffer)
            .map_err(BackendError::IncompleteFramebuffer)
    }

    fn copy_depth_read_to_draw(&mut self, src: Extent, dst: Extent) -> BackendResult<()> {
        let read = self.read_framebuffer;
        let draw = self.draw_framebuffer;
        if read == draw {
            return Err(BackendError::InvalidHandle(
                "depth copy source and destination are the same framebuffer".into(),
            ));
        }

        let src_id = self
            .framebuffers
            .get(&read.0)
            .and_then(|f| f.depth)
            .map(|a| a.image_id())
            .ok_or_else(|| BackendError::IncompleteFramebuffer("read framebuffer has no depth".into()))?;
        let dst_id = self
            .framebuffers
            .get(&draw.0)
            .and_then(|f| f.depth)
            .map(|a| a.image_id())
            .ok_or_else(|| BackendError::IncompleteFramebuffer("draw framebuffer has no depth".into()))?;

        let (src_extent, src_depth) = match self.images.get(&src_id) {
            Some(Image {
                extent,
                depth: Some(depth),
                ..
            }) => (*extent, depth.clone()),
            _ => return Err(BackendError::InvalidHandle("read depth image".into())),
        };
        let Some(Image {
            extent: dst_extent,
            depth: Some(dst_depth),
            ..
        }) = self.images.get_mut(&dst_id)
        else {
            return Err(BackendError::InvalidHandle("draw depth image".into()));
        };

        let src_w = src.width.min(src_extent.width);
        let src_h = src.height.min(src_extent.height);
        let dst_w = dst.width.min(dst_extent.width);
        let dst_h = dst.height.min(dst_extent.height);
        if src_w == 0 || src_h == 0 {
            return Ok(());
        }

        // nearest-neighbour when the rectangles differ, like a blit with NEAREST
        for y in 0..dst_h {
            let sy = (y as u64 * src_h as u64 / dst_h as u64) as u32;
            for x in 0..dst_w {
                let sx = (x as u64 * src_w as u64 / dst_w as u64) as u32;
                dst_depth[(y * dst_extent.width + x) as usize] =
                    src_depth[(sy * src_extent.width + sx) as usize];
            }
        }
        log::trace!(
            "HeadlessContext: copied depth {}x{} -> {}x{}",
            src_w,
            src_h,
            dst_w,
            dst_h
        );
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        self.check_allocation("texture", desc.label.as_deref())?;
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::AllocationFailed(format!(
                "texture {:?} with zero size",
                desc.label
            )));
        }
        let id = self.allocate_id();
        log::trace!(
            "HeadlessContext: creating texture {:?} ({}x{}, {:?})",
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );
        self.images.insert(
            id,
            Image::new(
                desc.label.clone(),
                ImageKind::Texture,
                desc.target,
                desc.format,
                Extent::new(desc.width, desc.height),
            ),
        );
        Ok(TextureHandle(id))
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        let is_texture = self
            .images
            .get(&texture.0)
            .is_some_and(|i| i.kind == ImageKind::Texture);
        if !is_texture {
            return;
        }
        self.images.remove(&texture.0);
        // deleting a bound texture unbinds it, as GL does
        self.texture_units.retain(|_, (_, bound)| *bound != texture);
        self.cache.forget_texture(texture);
    }

    fn create_renderbuffer(
        &mut self,
        format: TextureFormat,
        extent: Extent,
    ) -> BackendResult<RenderbufferHandle> {
        self.check_allocation("renderbuffer", None)?;
        if extent.is_empty() {
            return Err(BackendError::AllocationFailed(
                "renderbuffer with zero size".into(),
            ));
        }
        let id = self.allocate_id();
        self.images.insert(
            id,
            Image::new(
                None,
                ImageKind::Renderbuffer,
                TextureTarget::Texture2D,
                format,
                extent,
            ),
        );
        Ok(RenderbufferHandle(id))
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        let is_renderbuffer = self
            .images
            .get(&renderbuffer.0)
            .is_some_and(|i| i.kind == ImageKind::Renderbuffer);
        if is_renderbuffer {
            self.images.remove(&renderbuffer.0);
        }
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: TextureHandle) {
        match self.images.get(&texture.0) {
            Some(image) if image.kind == ImageKind::Texture => {
                if image.target != target {
                    let message = format!(
                        "texture {:?} is {:?}, bound as {:?}",
                        image.label, image.target, target
                    );
                    self.violation(message);
                }
            }
            _ => {
                self.violation(format!("binding dead texture {} to unit {}", texture.0, unit));
                return;
            }
        }
        self.texture_units.insert(unit, (target, texture));
        self.cache.record_bind(unit, target, texture);
        self.texture_binds += 1;
    }

    fn bind_cache(&mut self) -> &mut BindStateCache {
        &mut self.cache
    }

    fn create_shader(&mut self, label: &str) -> BackendResult<ShaderHandle> {
        let id = self.allocate_id();
        self.shaders.insert(
            id,
            ShaderObject {
                label: label.to_string(),
                uniforms: HashMap::new(),
            },
        );
        Ok(ShaderHandle(id))
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader.0);
        if self.current_shader == Some(shader) {
            self.current_shader = None;
        }
    }

    fn set_shader(&mut self, shader: ShaderHandle) {
        if !self.shaders.contains_key(&shader.0) {
            self.violation(format!("binding deleted shader {}", shader.0));
            return;
        }
        self.current_shader = Some(shader);
    }

    fn upload_uniform(&mut self, id: UniformId, value: UniformValue) {
        let Some(shader) = self.current_shader else {
            self.violation(format!("uniform {:#x} uploaded with no shader bound", id.0));
            return;
        };
        if let Some(program) = self.shaders.get_mut(&shader.0) {
            program.uniforms.insert(id, value);
        }
    }

    fn create_vertex_array(
        &mut self,
        desc: &VertexArrayDescriptor<'_>,
    ) -> BackendResult<VertexArrayHandle> {
        self.check_allocation("vertex array", desc.label)?;
        let stride = desc.layout.array_stride.max(1);
        let id = self.allocate_id();
        self.vertex_arrays.insert(
            id,
            VertexArrayObject {
                label: desc.label.map(str::to_string),
                vertex_count: desc.vertex_data.len() as u64 / stride,
                index_count: desc.indices.map(|i| i.len() as u32),
            },
        );
        Ok(VertexArrayHandle(id))
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array.0);
        if self.current_vertex_array == Some(vertex_array) {
            self.current_vertex_array = None;
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if !self.vertex_arrays.contains_key(&vertex_array.0) {
            self.violation(format!("binding deleted vertex array {}", vertex_array.0));
            return;
        }
        self.current_vertex_array = Some(vertex_array);
    }

    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        index_count: u32,
        format: IndexFormat,
        offset: u32,
    ) {
        if let Some(vao) = self
            .current_vertex_array
            .and_then(|v| self.vertex_arrays.get(&v.0))
        {
            let available = vao.index_count.unwrap_or(0);
            let first = offset / format.size();
            if first + index_count > available {
                let message = format!(
                    "draw of {} indices from {:?} which holds {}",
                    index_count, vao.label, available
                );
                self.violation(message);
            }
        }
        self.record_draw(topology, index_count, true);
    }

    fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32) {
        if let Some(vao) = self
            .current_vertex_array
            .and_then(|v| self.vertex_arrays.get(&v.0))
        {
            if first as u64 + count as u64 > vao.vertex_count {
                let message = format!(
                    "draw of {} vertices from {:?} which holds {}",
                    count, vao.label, vao.vertex_count
                );
                self.violation(message);
            }
        }
        self.record_draw(topology, count, false);
    }
}

impl HeadlessContext {
    fn record_draw(&mut self, topology: PrimitiveTopology, count: u32, indexed: bool) {
        let framebuffer = self.draw_framebuffer;

        if let Err(reason) = self.framebuffer_complete(framebuffer) {
            self.violation(format!("draw into incomplete framebuffer: {}", reason));
        }
        if self.current_vertex_array.is_none() {
            self.violation("draw with no vertex array bound".into());
        }

        let (shader_label, uniforms) = match self.current_shader.and_then(|s| self.shaders.get(&s.0)) {
            Some(program) => (Some(program.label.clone()), program.uniforms.clone()),
            None => {
                self.violation("draw with no shader bound".into());
                (None, HashMap::new())
            }
        };

        // a sampled unit holding one of the draw target's own attachments is a feedback loop
        let attached: HashSet<u64> = self
            .framebuffers
            .get(&framebuffer.0)
            .map(|f| f.attachments().map(|(_, a)| a.image_id()).collect())
            .unwrap_or_default();
        let sampled_units: Vec<u32> = uniforms
            .values()
            .filter_map(|v| match v {
                UniformValue::Sampler(unit) => Some(*unit),
                _ => None,
            })
            .collect();
        for unit in sampled_units {
            if let Some((_, texture)) = self.texture_units.get(&unit) {
                if attached.contains(&texture.0) {
                    let message = format!(
                        "feedback loop: unit {} samples {:?} while it is attached to the draw target",
                        unit,
                        self.texture_label(*texture)
                    );
                    self.violation(message);
                }
            }
        }

        log::trace!(
            "HeadlessContext: draw {:?} x{} into {} with {:?}",
            topology,
            count,
            framebuffer.0,
            shader_label
        );

        self.draws.push(DrawCall {
            shader: self.current_shader,
            shader_label,
            framebuffer,
            vertex_array: self.current_vertex_array,
            topology,
            count,
            indexed,
            state: self.state,
            uniforms,
        });
    }
}
