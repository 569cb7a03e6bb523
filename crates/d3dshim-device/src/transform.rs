use bytemuck::{Pod, Zeroable};

use crate::d3d9;

/// Row-major 4×4 matrix, `m[row][column]`.
pub type Matrix4 = [[f32; 4]; 4];

pub const IDENTITY: Matrix4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

pub fn transpose(m: &Matrix4) -> Matrix4 {
    let mut out = [[0.0; 4]; 4];
    for (r, row) in m.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            out[c][r] = *value;
        }
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransformKind {
    World,
    View,
    Projection,
}

impl TryFrom<u32> for TransformKind {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, u32> {
        match raw {
            d3d9::D3DTS_WORLD => Ok(Self::World),
            d3d9::D3DTS_VIEW => Ok(Self::View),
            d3d9::D3DTS_PROJECTION => Ok(Self::Projection),
            other => Err(other),
        }
    }
}

/// Layout of the transform constant buffer bound to the default vertex shader.
///
/// Matrices are stored transposed so the shader can read columns as registers.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TransformBlock {
    pub world: Matrix4,
    pub view: Matrix4,
    pub projection: Matrix4,
}

impl TransformBlock {
    pub const SIZE: u32 = std::mem::size_of::<TransformBlock>() as u32;

    pub fn identity() -> Self {
        Self {
            world: IDENTITY,
            view: IDENTITY,
            projection: IDENTITY,
        }
    }
}

/// CPU shadow of the transform block. Writes are deferred to the next draw.
#[derive(Debug, Clone)]
pub struct TransformState {
    block: TransformBlock,
    dirty: bool,
}

impl Default for TransformState {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformState {
    /// Identity for every slot. The GPU copy is created from the same block, so the state
    /// starts clean.
    pub fn new() -> Self {
        Self {
            block: TransformBlock::identity(),
            dirty: false,
        }
    }

    pub fn set(&mut self, kind: TransformKind, matrix: &Matrix4) {
        let slot = match kind {
            TransformKind::World => &mut self.block.world,
            TransformKind::View => &mut self.block.view,
            TransformKind::Projection => &mut self.block.projection,
        };
        *slot = transpose(matrix);
        self.dirty = true;
    }

    pub fn block(&self) -> &TransformBlock {
        &self.block
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
