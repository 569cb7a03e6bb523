//! Legacy state translation: primitive topologies and the small closed set of blend,
//! rasterizer, sampler and depth combinations the shim recognizes.

pub mod objects;
pub mod topology;

pub use objects::{
    alpha_blend_factor, depth_desc, translate_blend, translate_rasterizer, translate_sampler,
    StateCache,
};
pub use topology::{
    build_fan_indices, expand_triangle_fan_u16, fan_vertex_capacity, translate_primitive_topology,
    triangulate_fan, verts_from_prim_count, PrimitiveTopologyTranslation, PrimitiveType,
};
