//! Immediate-mode draw shim over an explicit, D3D11-class GPU API.
//!
//! Legacy callers submit "primitive type + count + raw vertex data" draws, set world/view/
//! projection transforms, and address shader constants by name. The modern API underneath
//! ([`backend::GpuBackend`]) only knows pre-created buffers, immutable state objects and
//! explicit resource views. [`DeviceShim`] bridges the two:
//!
//! - geometry goes through fixed-capacity dynamic buffers; overflow is clamped, never written
//!   past the buffer;
//! - triangle fans are drawn as triangle lists through a precomputed fan index buffer;
//! - the transform block and reflected shader constants are uploaded lazily, in a fixed order,
//!   right before the draw that needs them;
//! - blend, rasterizer, sampler and depth state are created once per recognized combination.
//!
//! Everything is single-threaded. Shared reflection tables are `Rc<RefCell<_>>`.

pub mod backend;
pub mod config;
pub mod d3d9;
pub mod device;
pub mod error;
pub mod reflection;
pub mod shader;
pub mod state;
pub mod transform;
pub mod vertex;

pub use config::ShimConfig;
pub use device::{DepthBinding, DeviceShim, MAX_TEXTURE_SLOTS};
pub use error::ShimError;
pub use reflection::{
    BindingHandle, ConstantError, MatrixOrder, ReflectionError, ResourceBinding,
    ShaderReflectionTable, ShaderVariable, SharedReflectionTable, TypeClass, VariableHandle,
    MAX_CONSTANT_BUFFER_SLOTS,
};
pub use shader::{BuiltinShader, BuiltinShaderBytecode, PixelShader, VertexShader};
pub use state::PrimitiveType;
pub use transform::{Matrix4, TransformKind};
pub use vertex::{ColorVertex, DualTexturedVertex, TexturedVertex, Vertex, VertexFormat};
