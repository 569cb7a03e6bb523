use bytemuck::{Pod, Zeroable};

use crate::backend::{ElementFormat, InputElement};

/// Byte stride of the widest fixed layout; sizes the vertex geometry buffer.
pub const MAX_VERTEX_STRIDE: u32 = 32;

/// Position plus packed `0xAARRGGBB` diffuse color.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: [f32; 3],
    pub color: u32,
    pub uv: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DualTexturedVertex {
    pub position: [f32; 3],
    pub color: u32,
    pub uv0: [f32; 2],
    pub uv1: [f32; 2],
}

/// The three fixed vertex layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Color,
    Textured,
    DualTextured,
}

impl VertexFormat {
    pub const ALL: [VertexFormat; 3] = [Self::Color, Self::Textured, Self::DualTextured];

    pub fn stride(self) -> u32 {
        match self {
            Self::Color => 16,
            Self::Textured => 24,
            Self::DualTextured => 32,
        }
    }

    pub fn input_elements(self) -> &'static [InputElement] {
        const POSITION: InputElement = InputElement {
            semantic: "POSITION",
            semantic_index: 0,
            format: ElementFormat::Float32x3,
            offset: 0,
        };
        const COLOR: InputElement = InputElement {
            semantic: "COLOR",
            semantic_index: 0,
            format: ElementFormat::Bgra8Unorm,
            offset: 12,
        };
        const UV0: InputElement = InputElement {
            semantic: "TEXCOORD",
            semantic_index: 0,
            format: ElementFormat::Float32x2,
            offset: 16,
        };
        const UV1: InputElement = InputElement {
            semantic: "TEXCOORD",
            semantic_index: 1,
            format: ElementFormat::Float32x2,
            offset: 24,
        };

        match self {
            Self::Color => &[POSITION, COLOR],
            Self::Textured => &[POSITION, COLOR, UV0],
            Self::DualTextured => &[POSITION, COLOR, UV0, UV1],
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Color => 0,
            Self::Textured => 1,
            Self::DualTextured => 2,
        }
    }
}

/// A fixed vertex struct usable with the typed draw helpers.
pub trait Vertex: Pod {
    const FORMAT: VertexFormat;
}

impl Vertex for ColorVertex {
    const FORMAT: VertexFormat = VertexFormat::Color;
}

impl Vertex for TexturedVertex {
    const FORMAT: VertexFormat = VertexFormat::Textured;
}

impl Vertex for DualTexturedVertex {
    const FORMAT: VertexFormat = VertexFormat::DualTextured;
}

/// One value per [`VertexFormat`].
#[derive(Debug, Clone)]
pub(crate) struct PerFormat<T>([T; 3]);

impl<T> PerFormat<T> {
    pub(crate) fn new(values: [T; 3]) -> Self {
        Self(values)
    }

    pub(crate) fn get(&self, format: VertexFormat) -> &T {
        &self.0[format.index()]
    }
}
