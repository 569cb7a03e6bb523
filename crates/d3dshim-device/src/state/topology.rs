use std::fmt;

use crate::backend::Topology;
use crate::d3d9;

/// Legacy primitive types accepted by the draw entry points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

impl TryFrom<u32> for PrimitiveType {
    /// The unrecognized raw value.
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, u32> {
        Ok(match raw {
            d3d9::D3DPT_POINTLIST => Self::PointList,
            d3d9::D3DPT_LINELIST => Self::LineList,
            d3d9::D3DPT_LINESTRIP => Self::LineStrip,
            d3d9::D3DPT_TRIANGLELIST => Self::TriangleList,
            d3d9::D3DPT_TRIANGLESTRIP => Self::TriangleStrip,
            d3d9::D3DPT_TRIANGLEFAN => Self::TriangleFan,
            other => return Err(other),
        })
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimitiveType::PointList => "point_list",
            PrimitiveType::LineList => "line_list",
            PrimitiveType::LineStrip => "line_strip",
            PrimitiveType::TriangleList => "triangle_list",
            PrimitiveType::TriangleStrip => "triangle_strip",
            PrimitiveType::TriangleFan => "triangle_fan",
        };
        f.write_str(s)
    }
}

impl PrimitiveType {
    /// Number of vertices (or indices) consumed by `count` primitives.
    pub fn verts_from_prim_count(self, count: u32) -> u32 {
        match self {
            PrimitiveType::PointList => count,
            PrimitiveType::LineList => count.saturating_mul(2),
            PrimitiveType::LineStrip => count.saturating_add(1),
            PrimitiveType::TriangleList => count.saturating_mul(3),
            PrimitiveType::TriangleStrip | PrimitiveType::TriangleFan => count.saturating_add(2),
        }
    }

    /// Whole primitives formed by `vertices` vertices (or indices); leftovers are dropped.
    pub fn prim_count_from_verts(self, vertices: u32) -> u32 {
        match self {
            PrimitiveType::PointList => vertices,
            PrimitiveType::LineList => vertices / 2,
            PrimitiveType::LineStrip => vertices.saturating_sub(1),
            PrimitiveType::TriangleList => vertices / 3,
            PrimitiveType::TriangleStrip | PrimitiveType::TriangleFan => vertices.saturating_sub(2),
        }
    }
}

/// Raw-value form of [`PrimitiveType::verts_from_prim_count`]; `None` for unknown types.
pub fn verts_from_prim_count(raw_type: u32, count: u32) -> Option<u32> {
    PrimitiveType::try_from(raw_type)
        .ok()
        .map(|ty| ty.verts_from_prim_count(count))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrimitiveTopologyTranslation {
    pub topology: Topology,
    /// The native API has no fans; callers draw through the fan index buffer instead.
    pub needs_triangle_fan_emulation: bool,
}

pub fn translate_primitive_topology(primitive: PrimitiveType) -> PrimitiveTopologyTranslation {
    let (topology, needs_triangle_fan_emulation) = match primitive {
        PrimitiveType::PointList => (Topology::PointList, false),
        PrimitiveType::LineList => (Topology::LineList, false),
        PrimitiveType::LineStrip => (Topology::LineStrip, false),
        PrimitiveType::TriangleList => (Topology::TriangleList, false),
        PrimitiveType::TriangleStrip => (Topology::TriangleStrip, false),
        PrimitiveType::TriangleFan => (Topology::TriangleList, true),
    };
    PrimitiveTopologyTranslation {
        topology,
        needs_triangle_fan_emulation,
    }
}

/// Largest fan (in vertices) the shared fan index buffer covers for a given vertex capacity.
pub fn fan_vertex_capacity(vertex_capacity: u32) -> u32 {
    vertex_capacity / 6
}

/// Indices of the shared fan buffer: triangle(i) = (0, i, i+1) for i in `1..=fan_vertices-2`.
///
/// `fan_vertices` must not exceed 65536 so every index fits in 16 bits.
pub fn build_fan_indices(fan_vertices: u32) -> Vec<u16> {
    debug_assert!(fan_vertices <= 1 << 16);
    if fan_vertices < 3 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(((fan_vertices - 2) * 3) as usize);
    for i in 1..(fan_vertices - 1) {
        out.push(0);
        out.push(i as u16);
        out.push((i + 1) as u16);
    }
    out
}

/// Expand an indexed triangle-fan into a triangle-list, using the legacy index ordering:
/// triangle(i) = (0, i, i+1).
pub fn expand_triangle_fan_u16(indices: &[u16]) -> Vec<u16> {
    if indices.len() < 3 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity((indices.len() - 2) * 3);
    for i in 1..(indices.len() - 1) {
        out.push(indices[0]);
        out.push(indices[i]);
        out.push(indices[i + 1]);
    }
    out
}

/// Reference triangulation of a non-indexed fan, as vertex triples.
pub fn triangulate_fan(vertex_count: u32) -> Vec<[u32; 3]> {
    (1..vertex_count.saturating_sub(1))
        .map(|i| [0, i, i + 1])
        .collect()
}
