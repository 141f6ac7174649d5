//! Common types shared between GPU contexts

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Pixel formats the pipeline allocates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    Rgba8Unorm,
    /// Half-float RGB, used for outline silhouettes
    Rgb16Float,
    /// Half-float RGBA, used for every HDR stage
    Rgba16Float,
    Depth24,
}

impl TextureFormat {
    pub fn is_depth(self) -> bool {
        self == TextureFormat::Depth24
    }
}

/// What kind of image a texture handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureTarget {
    #[default]
    Texture2D,
    CubeMap,
}

/// How a texture may be used, as a bit set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureUsage(u8);

impl TextureUsage {
    /// Written from the CPU
    pub const UPLOAD: Self = Self(0b001);
    /// Read by shaders through a texture unit
    pub const SAMPLED: Self = Self(0b010);
    /// Attached to a framebuffer
    pub const ATTACHMENT: Self = Self(0b100);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

/// Behavior for coordinates outside [0, 1], on both axes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Wrap {
    #[default]
    ClampToEdge,
    ClampToBorder(Vec4),
    Repeat,
}

/// Sampling parameters baked into a texture object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SamplerDescriptor {
    pub filter: Filter,
    pub wrap: Wrap,
}

impl SamplerDescriptor {
    /// Point sampling clamped to the edge; render target attachments use this
    pub fn nearest() -> Self {
        Self {
            filter: Filter::Nearest,
            wrap: Wrap::ClampToEdge,
        }
    }

    /// Linear filtering that reads `border` outside the image
    pub fn clamp_to_border(border: Vec4) -> Self {
        Self {
            filter: Filter::Linear,
            wrap: Wrap::ClampToBorder(border),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub target: TextureTarget,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub sampler: SamplerDescriptor,
}

impl Default for TextureDescriptor {
    /// A 1x1 sampled RGBA8 image
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            mip_levels: 1,
            target: TextureTarget::default(),
            format: TextureFormat::default(),
            usage: TextureUsage::SAMPLED | TextureUsage::UPLOAD,
            sampler: SamplerDescriptor::default(),
        }
    }
}

/// Framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    Color(u32),
    Depth,
}

/// Which buffers a clear touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearFlags(u32);

impl ClearFlags {
    pub const COLOR: Self = Self(1 << 0);
    pub const DEPTH: Self = Self(1 << 1);
    pub const COLOR_DEPTH: Self = Self((1 << 0) | (1 << 1));

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for ClearFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// One float vector attribute inside an interleaved vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    /// Number of f32 components, 1 to 4
    pub components: u32,
    pub offset: u64,
}

/// Interleaved vertex buffer layout
#[derive(Debug, Clone)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexBufferLayout {
    /// Pack float attributes back to back at locations 0.. in order
    pub fn packed(components: &[u32]) -> Self {
        let mut offset = 0;
        let attributes = components
            .iter()
            .enumerate()
            .map(|(location, &components)| {
                let attribute = VertexAttribute {
                    location: location as u32,
                    components,
                    offset,
                };
                offset += components as u64 * 4;
                attribute
            })
            .collect();
        Self {
            array_stride: offset,
            attributes,
        }
    }
}

/// Mesh vertex: position, normal, uv
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    pub fn layout() -> VertexBufferLayout {
        VertexBufferLayout::packed(&[3, 3, 2])
    }
}

/// Geometry to upload as a vertex array object
#[derive(Debug, Clone)]
pub struct VertexArrayDescriptor<'a> {
    pub label: Option<&'a str>,
    pub vertex_data: &'a [u8],
    pub layout: VertexBufferLayout,
    pub indices: Option<&'a [u32]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexFormat {
    Uint16,
    #[default]
    Uint32,
}

impl IndexFormat {
    /// Bytes per index
    pub fn size(&self) -> u32 {
        match self {
            IndexFormat::Uint16 => std::mem::size_of::<u16>() as u32,
            IndexFormat::Uint32 => std::mem::size_of::<u32>() as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    LineList,
    TriangleList,
    /// Full-screen quads are drawn as a four-vertex strip
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullFace {
    /// Light volumes cull front faces so the camera may sit inside them
    Front,
    #[default]
    Back,
}

/// Depth comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareFunction {
    #[default]
    Less,
    /// Skybox depth is written at the far plane
    LessEqual,
    Equal,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendOperation {
    #[default]
    Add,
    Subtract,
}

/// Snapshot of the fixed-function state a draw call executes with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterState {
    pub depth_test: bool,
    pub depth_compare: CompareFunction,
    pub cull_enabled: bool,
    pub cull_face: CullFace,
    pub blend_enabled: bool,
    pub blend_operation: BlendOperation,
    pub blend_src: BlendFactor,
    pub blend_dst: BlendFactor,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_compare: CompareFunction::Less,
            cull_enabled: false,
            cull_face: CullFace::Back,
            blend_enabled: false,
            blend_operation: BlendOperation::Add,
            blend_src: BlendFactor::One,
            blend_dst: BlendFactor::Zero,
        }
    }
}

/// Shader uniform identifier, an FNV-1a hash of the uniform's name in the program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformId(pub u64);

impl UniformId {
    pub const fn from_name(name: &str) -> Self {
        Self(fnv1a(name.as_bytes()))
    }
}

pub(crate) const fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
        i += 1;
    }
    hash
}

/// Value uploaded to a shader uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    /// Texture unit a sampler uniform reads from
    Sampler(u32),
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        UniformValue::Mat4(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_ids_hash_names() {
        const VIEW_PROJ: UniformId = UniformId::from_name("viewProj");
        assert_eq!(VIEW_PROJ, UniformId::from_name("viewProj"));
        assert_ne!(VIEW_PROJ, UniformId::from_name("viewProjInv"));
        // FNV-1a offset basis for the empty string
        assert_eq!(UniformId::from_name("").0, 0xcbf2_9ce4_8422_2325);
    }

    #[test]
    fn packed_layout_matches_vertex_struct() {
        let layout = Vertex::layout();
        assert_eq!(layout.array_stride, std::mem::size_of::<Vertex>() as u64);
        let offsets: Vec<u64> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
    }

    #[test]
    fn usage_bits_combine() {
        let usage = TextureUsage::ATTACHMENT | TextureUsage::SAMPLED;
        assert!(usage.contains(TextureUsage::SAMPLED));
        assert!(!usage.contains(TextureUsage::UPLOAD));
        assert!(TextureFormat::Depth24.is_depth());
    }
}
