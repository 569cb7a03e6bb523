//! A bounds-checked parser for compiled shader containers (`DXBC`).
//!
//! Shader blobs handed to the draw shim are opaque, precompiled bytecode. The shim never
//! compiles or interprets shader code; it only needs two things out of a blob:
//!
//! - the container structure, to validate the blob and locate the shader chunk (`SHDR`/`SHEX`);
//! - the resource definition chunk (`RDEF`/`RD11`), which describes constant buffers, their
//!   named variables with byte offsets, and bound resources such as textures.
//!
//! Every offset and size is validated; malformed input produces a [`DxbcError`] and never
//! panics.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod dxbc;
mod error;
mod fourcc;
/// Parser for resource definition chunks (`RDEF`).
pub mod rdef;

/// Builders for synthetic containers and `RDEF` chunks.
///
/// Only available to this crate's own tests or with the `test-utils` feature; not part of the
/// stable parsing API.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::dxbc::{DxbcChunk, DxbcFile, DxbcHeader};
pub use crate::error::DxbcError;
pub use crate::fourcc::FourCC;
pub use crate::rdef::{
    parse_rdef_chunk, RdefChunk, RdefConstantBuffer, RdefResourceBinding, RdefStructMember,
    RdefType, RdefVariable, ShaderInputType, VariableClass,
};
