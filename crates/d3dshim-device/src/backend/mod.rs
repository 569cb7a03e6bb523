//! GPU backend abstraction.
//!
//! The shim targets an explicit, D3D11-class API: resources are created up front, state lives
//! in immutable objects, and the context only binds and draws. [`GpuBackend`] is that API.
//! Every backend object is an owned value; dropping it releases the underlying resource.
//!
//! [`SoftGpuBackend`] is a deterministic in-memory implementation used by tests and headless
//! callers.

mod soft;

use bitflags::bitflags;
use thiserror::Error;

pub use soft::{
    LiveObjects, ObjectKind, SoftBuffer, SoftCommand, SoftGpuBackend, SoftHandle, SoftView,
    DISCARD_FILL,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("invalid resource")]
    InvalidResource,
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("out of bounds")]
    OutOfBounds,
    #[error("invalid shader bytecode: {0}")]
    InvalidBytecode(String),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("internal error: {0}")]
    Internal(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct BindFlags: u32 {
        const VERTEX_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const CONSTANT_BUFFER = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// CPU-writable through [`GpuBackend::map_write_discard`].
    Dynamic,
    /// Contents fixed at creation.
    Immutable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub size: u32,
    pub bind: BindFlags,
    pub usage: BufferUsage,
}

/// Native primitive topologies. There is no fan; see [`crate::state::topology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementFormat {
    Float32x2,
    Float32x3,
    /// Packed `0xAARRGGBB` color, normalized.
    Bgra8Unorm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputElement {
    pub semantic: &'static str,
    pub semantic_index: u32,
    pub format: ElementFormat,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D2,
    /// Volumetric texture.
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Bgra8Unorm,
    Depth24Stencil8,
}

impl TextureFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth24Stencil8)
    }

    pub fn bytes_per_texel(self) -> u32 {
        4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    /// `1` for 2D textures.
    pub depth: u32,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub render_target: bool,
}

impl TextureDesc {
    pub fn d2(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            depth: 1,
            dimension: TextureDimension::D2,
            format,
            render_target: false,
        }
    }

    pub fn volume(width: u32, height: u32, depth: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            depth,
            dimension: TextureDimension::D3,
            format,
            render_target: false,
        }
    }

    pub fn render_target(width: u32, height: u32) -> Self {
        Self {
            render_target: true,
            ..Self::d2(width, height, TextureFormat::Bgra8Unorm)
        }
    }

    pub fn byte_len(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.depth as usize
            * self.format.bytes_per_texel() as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewDimension {
    Texture2D,
    Texture3D,
}

/// Native blend factors. Discriminants match the legacy `D3DBLEND` numbering for the
/// shared subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BlendFactor {
    Zero = 1,
    One = 2,
    SrcColor = 3,
    InvSrcColor = 4,
    SrcAlpha = 5,
    InvSrcAlpha = 6,
    DestAlpha = 7,
    InvDestAlpha = 8,
    DestColor = 9,
    InvDestColor = 10,
}

impl BlendFactor {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            1 => Self::Zero,
            2 => Self::One,
            3 => Self::SrcColor,
            4 => Self::InvSrcColor,
            5 => Self::SrcAlpha,
            6 => Self::InvSrcAlpha,
            7 => Self::DestAlpha,
            8 => Self::InvDestAlpha,
            9 => Self::DestColor,
            10 => Self::InvDestColor,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendDesc {
    pub enable: bool,
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    Wireframe,
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerDesc {
    pub cull: CullMode,
    pub fill: FillMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Point,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub filter: FilterMode,
    pub address: AddressMode,
}

/// Depth test uses less-or-equal when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilDesc {
    pub depth_enable: bool,
    pub depth_write: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// An explicit graphics device plus its immediate context.
///
/// Object types are owned handles; cloning a `Clone` handle adds a reference to the same
/// GPU object. Context calls take references and never retain ownership, so callers keep
/// bound objects alive for as long as they stay bound.
pub trait GpuBackend {
    type Buffer;
    type Texture: Clone;
    type ShaderResourceView;
    type RenderTargetView: Clone;
    type DepthStencilView: Clone;
    type Shader: Clone;
    type InputLayout: Clone;
    type BlendState;
    type RasterizerState;
    type SamplerState;
    type DepthStencilState;

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self::Buffer, BackendError>;

    /// Maps a dynamic buffer with discard semantics, hands the whole mapped range to
    /// `write`, then unmaps. Previous contents must not be relied upon.
    fn map_write_discard(
        &mut self,
        buffer: &Self::Buffer,
        write: &mut dyn FnMut(&mut [u8]),
    ) -> Result<(), BackendError>;

    fn create_shader(
        &mut self,
        stage: ShaderStage,
        bytecode: &[u8],
    ) -> Result<Self::Shader, BackendError>;

    /// `vs_bytecode` is the vertex shader the layout is validated against.
    fn create_input_layout(
        &mut self,
        elements: &[InputElement],
        vs_bytecode: &[u8],
    ) -> Result<Self::InputLayout, BackendError>;

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self::Texture, BackendError>;

    fn texture_desc(&self, texture: &Self::Texture) -> TextureDesc;

    fn create_shader_resource_view(
        &mut self,
        texture: &Self::Texture,
        dimension: ViewDimension,
    ) -> Result<Self::ShaderResourceView, BackendError>;

    fn create_render_target_view(
        &mut self,
        texture: &Self::Texture,
    ) -> Result<Self::RenderTargetView, BackendError>;

    fn create_depth_stencil_view(
        &mut self,
        texture: &Self::Texture,
    ) -> Result<Self::DepthStencilView, BackendError>;

    fn create_blend_state(&mut self, desc: &BlendDesc) -> Result<Self::BlendState, BackendError>;

    fn create_rasterizer_state(
        &mut self,
        desc: &RasterizerDesc,
    ) -> Result<Self::RasterizerState, BackendError>;

    fn create_sampler_state(
        &mut self,
        desc: &SamplerDesc,
    ) -> Result<Self::SamplerState, BackendError>;

    fn create_depth_stencil_state(
        &mut self,
        desc: &DepthStencilDesc,
    ) -> Result<Self::DepthStencilState, BackendError>;

    fn set_vertex_buffer(&mut self, buffer: &Self::Buffer, stride: u32);
    /// Index buffers are always 16-bit.
    fn set_index_buffer(&mut self, buffer: &Self::Buffer);
    fn set_input_layout(&mut self, layout: Option<&Self::InputLayout>);
    fn set_primitive_topology(&mut self, topology: Topology);
    fn set_shader(&mut self, stage: ShaderStage, shader: Option<&Self::Shader>);
    fn set_constant_buffers(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        buffers: &[Option<&Self::Buffer>],
    );
    fn set_shader_resource(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        view: Option<&Self::ShaderResourceView>,
    );
    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: &Self::SamplerState);
    fn set_blend_state(&mut self, state: &Self::BlendState);
    fn set_rasterizer_state(&mut self, state: &Self::RasterizerState);
    fn set_depth_stencil_state(&mut self, state: &Self::DepthStencilState);
    fn set_render_target(
        &mut self,
        color: Option<&Self::RenderTargetView>,
        depth: Option<&Self::DepthStencilView>,
    );
    fn set_viewport(&mut self, viewport: Viewport);
    fn clear_render_target(&mut self, view: &Self::RenderTargetView, rgba: [f32; 4]);

    fn draw(&mut self, vertex_count: u32, start_vertex: u32);
    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32);
}
