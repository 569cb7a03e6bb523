//! `RDEF` chunk layout (all fields little-endian `u32` unless noted):
//!
//! ```text
//! header:    cb_count, cb_offset, binding_count, binding_offset, target, flags, creator_offset
//!            (SM5 `RD11` headers append 7 more dwords, ignored here)
//! cbuffer:   name, variable_count, variable_offset, size, flags, kind            (24 bytes)
//! binding:   name, input_type, return_type, dimension, samples, bind_point,
//!            bind_count, flags                                                   (32 bytes)
//! variable:  name, offset, size, flags, type_offset, default_offset              (24 bytes)
//!            SM5 adds texture/sampler start+size                                 (40 bytes)
//! type:      class:u16, base_type:u16, rows:u16, columns:u16, elements:u16,
//!            member_count:u16, member_offset                                     (16 bytes)
//! member:    name, type_offset, offset                                           (12 bytes)
//! ```
//!
//! All `name`/`*_offset` fields are byte offsets from the start of the chunk.

use crate::error::DxbcError;

const HEADER_LEN: usize = 28;
const CBUFFER_DESC_LEN: usize = 24;
const BINDING_DESC_LEN: usize = 32;
const VARIABLE_DESC_LEN_SM4: usize = 24;
const VARIABLE_DESC_LEN_SM5: usize = 40;
const TYPE_DESC_LEN: usize = 16;
const MEMBER_DESC_LEN: usize = 12;

/// Upper bound for any table count in the chunk.
const MAX_TABLE_ENTRIES: u32 = 4096;
const MAX_TYPE_DEPTH: u32 = 32;

/// Parsed resource definitions of one shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefChunk {
    /// Packed target token: program type in the high 16 bits, `major << 4 | minor` in the low
    /// byte.
    pub target: u32,
    /// Compile flags.
    pub flags: u32,
    /// Compiler identification string, if present.
    pub creator: Option<String>,
    /// Constant buffers in declaration order.
    pub constant_buffers: Vec<RdefConstantBuffer>,
    /// Bound resources (constant buffers, textures, samplers, ...).
    pub bound_resources: Vec<RdefResourceBinding>,
}

impl RdefChunk {
    /// Returns `(major, minor)` of the target shader model.
    pub fn shader_model(&self) -> (u8, u8) {
        model_of(self.target)
    }
}

/// A reflected constant buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefConstantBuffer {
    /// Declared name (`$Globals` for loose globals).
    pub name: String,
    /// Declared size in bytes.
    pub size: u32,
    /// Buffer flags.
    pub flags: u32,
    /// Buffer kind (`0` = cbuffer, `1` = tbuffer, ...).
    pub kind: u32,
    /// Variables in declaration order.
    pub variables: Vec<RdefVariable>,
}

/// A reflected variable inside a constant buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefVariable {
    /// Declared name.
    pub name: String,
    /// Byte offset within the owning buffer.
    pub offset: u32,
    /// Size in bytes.
    pub size: u32,
    /// Variable flags (bit 1 = used by the shader).
    pub flags: u32,
    /// Type description.
    pub ty: RdefType,
}

/// A reflected type description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefType {
    /// Raw type class; see [`VariableClass`].
    pub class: u16,
    /// Raw base type (`3` = float, `2` = int, ...).
    pub base_type: u16,
    /// Rows.
    pub rows: u16,
    /// Columns.
    pub columns: u16,
    /// Array elements, `0` for non-arrays.
    pub elements: u16,
    /// Struct members, empty for non-structs.
    pub members: Vec<RdefStructMember>,
}

impl RdefType {
    /// Decoded type class.
    pub fn class(&self) -> VariableClass {
        VariableClass::from_raw(self.class)
    }
}

/// A member of a struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefStructMember {
    /// Member name.
    pub name: String,
    /// Byte offset from the start of the struct.
    pub offset: u32,
    /// Member type.
    pub ty: RdefType,
}

/// A resource bound to the shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefResourceBinding {
    /// Declared name.
    pub name: String,
    /// Raw input type; see [`ShaderInputType`].
    pub input_type: u32,
    /// Return type of texture resources.
    pub return_type: u32,
    /// View dimension of texture resources.
    pub dimension: u32,
    /// First bind slot.
    pub bind_point: u32,
    /// Number of contiguous slots.
    pub bind_count: u32,
    /// Binding flags.
    pub flags: u32,
}

impl RdefResourceBinding {
    /// Decoded input type.
    pub fn kind(&self) -> ShaderInputType {
        ShaderInputType::from_raw(self.input_type)
    }
}

/// Type class of a reflected variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableClass {
    /// `float`, `int`, ...
    Scalar,
    /// `float2`..`float4`.
    Vector,
    /// Matrix stored one register per row (`row_major`).
    MatrixRows,
    /// Matrix stored one register per column (compiler default).
    MatrixColumns,
    /// Objects, structs and anything else.
    Other(u16),
}

impl VariableClass {
    /// Decodes the raw class value.
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Scalar,
            1 => Self::Vector,
            2 => Self::MatrixRows,
            3 => Self::MatrixColumns,
            other => Self::Other(other),
        }
    }
}

/// Kind of a bound resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderInputType {
    /// Constant buffer.
    ConstantBuffer,
    /// Texture buffer.
    TextureBuffer,
    /// Texture (any dimension).
    Texture,
    /// Sampler.
    Sampler,
    /// Anything else (UAVs, structured buffers, ...).
    Other(u32),
}

impl ShaderInputType {
    /// Decodes the raw input type.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::ConstantBuffer,
            1 => Self::TextureBuffer,
            2 => Self::Texture,
            3 => Self::Sampler,
            other => Self::Other(other),
        }
    }
}

/// Parses an `RDEF`/`RD11` chunk payload.
pub fn parse_rdef_chunk(bytes: &[u8]) -> Result<RdefChunk, DxbcError> {
    let r = Reader { bytes };
    if bytes.len() < HEADER_LEN {
        return Err(DxbcError::invalid_chunk(format!(
            "RDEF header needs {HEADER_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    let cb_count = r.u32_at(0)?;
    let cb_offset = r.u32_at(4)?;
    let binding_count = r.u32_at(8)?;
    let binding_offset = r.u32_at(12)?;
    let target = r.u32_at(16)?;
    let flags = r.u32_at(20)?;
    let creator_offset = r.u32_at(24)?;

    let creator = match creator_offset {
        0 => None,
        off => Some(r.cstr_at(off)?),
    };

    let (major, _) = model_of(target);
    let variable_desc_len = if major >= 5 {
        VARIABLE_DESC_LEN_SM5
    } else {
        VARIABLE_DESC_LEN_SM4
    };

    let mut constant_buffers = Vec::with_capacity(checked_count(cb_count, "constant buffer")?);
    for base in r.table(cb_offset, cb_count, CBUFFER_DESC_LEN, "constant buffer")? {
        let name = r.cstr_at(r.u32_at(base)?)?;
        let variable_count = r.u32_at(base + 4)?;
        let variable_offset = r.u32_at(base + 8)?;
        let size = r.u32_at(base + 12)?;
        let cb_flags = r.u32_at(base + 16)?;
        let kind = r.u32_at(base + 20)?;

        let mut variables = Vec::with_capacity(checked_count(variable_count, "variable")?);
        for vbase in r.table(variable_offset, variable_count, variable_desc_len, "variable")? {
            let var_name = r.cstr_at(r.u32_at(vbase)?)?;
            let offset = r.u32_at(vbase + 4)?;
            let var_size = r.u32_at(vbase + 8)?;
            let var_flags = r.u32_at(vbase + 12)?;
            let type_offset = r.u32_at(vbase + 16)?;
            variables.push(RdefVariable {
                name: var_name,
                offset,
                size: var_size,
                flags: var_flags,
                ty: r.type_at(type_offset, 0)?,
            });
        }

        constant_buffers.push(RdefConstantBuffer {
            name,
            size,
            flags: cb_flags,
            kind,
            variables,
        });
    }

    let mut bound_resources = Vec::with_capacity(checked_count(binding_count, "binding")?);
    for base in r.table(binding_offset, binding_count, BINDING_DESC_LEN, "binding")? {
        bound_resources.push(RdefResourceBinding {
            name: r.cstr_at(r.u32_at(base)?)?,
            input_type: r.u32_at(base + 4)?,
            return_type: r.u32_at(base + 8)?,
            dimension: r.u32_at(base + 12)?,
            bind_point: r.u32_at(base + 20)?,
            bind_count: r.u32_at(base + 24)?,
            flags: r.u32_at(base + 28)?,
        });
    }

    Ok(RdefChunk {
        target,
        flags,
        creator,
        constant_buffers,
        bound_resources,
    })
}

fn model_of(target: u32) -> (u8, u8) {
    let version = (target & 0xFF) as u8;
    (version >> 4, version & 0xF)
}

fn checked_count(count: u32, what: &str) -> Result<usize, DxbcError> {
    if count > MAX_TABLE_ENTRIES {
        return Err(DxbcError::invalid_chunk(format!(
            "{what} count {count} exceeds maximum {MAX_TABLE_ENTRIES}"
        )));
    }
    Ok(count as usize)
}

#[derive(Clone, Copy)]
struct Reader<'a> {
    bytes: &'a [u8],
}

impl Reader<'_> {
    fn u16_at(&self, offset: usize) -> Result<u16, DxbcError> {
        self.slice(offset, 2)
            .map(|s| u16::from_le_bytes([s[0], s[1]]))
    }

    fn u32_at(&self, offset: usize) -> Result<u32, DxbcError> {
        self.slice(offset, 4)
            .map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&[u8], DxbcError> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| {
                DxbcError::out_of_bounds(format!(
                    "RDEF read of {len} bytes at {offset} exceeds chunk length {}",
                    self.bytes.len()
                ))
            })
    }

    fn cstr_at(&self, offset: u32) -> Result<String, DxbcError> {
        let start = offset as usize;
        let tail = self.bytes.get(start..).ok_or_else(|| {
            DxbcError::out_of_bounds(format!("RDEF string offset {start} is outside the chunk"))
        })?;
        let len = tail.iter().position(|&b| b == 0).ok_or_else(|| {
            DxbcError::invalid_chunk(format!("RDEF string at {start} is not NUL-terminated"))
        })?;
        core::str::from_utf8(&tail[..len])
            .map(str::to_owned)
            .map_err(|_| DxbcError::invalid_chunk(format!("RDEF string at {start} is not UTF-8")))
    }

    /// Validates a `count * stride` table at `offset` and yields the start of each entry.
    fn table(
        &self,
        offset: u32,
        count: u32,
        stride: usize,
        what: &str,
    ) -> Result<impl Iterator<Item = usize>, DxbcError> {
        let count = checked_count(count, what)?;
        let start = offset as usize;
        let fits = stride
            .checked_mul(count)
            .and_then(|len| start.checked_add(len))
            .is_some_and(|end| end <= self.bytes.len());
        if count > 0 && !fits {
            return Err(DxbcError::out_of_bounds(format!(
                "RDEF {what} table ({count} x {stride} bytes at {start}) exceeds chunk length {}",
                self.bytes.len()
            )));
        }
        Ok((0..count).map(move |i| start + i * stride))
    }

    fn type_at(&self, offset: u32, depth: u32) -> Result<RdefType, DxbcError> {
        if depth > MAX_TYPE_DEPTH {
            return Err(DxbcError::invalid_chunk("RDEF type nesting too deep"));
        }
        let base = offset as usize;
        self.slice(base, TYPE_DESC_LEN)?;

        let member_count = self.u16_at(base + 10)?;
        let member_offset = self.u32_at(base + 12)?;
        let mut members = Vec::with_capacity(member_count as usize);
        for mbase in self.table(
            member_offset,
            u32::from(member_count),
            MEMBER_DESC_LEN,
            "struct member",
        )? {
            members.push(RdefStructMember {
                name: self.cstr_at(self.u32_at(mbase)?)?,
                ty: self.type_at(self.u32_at(mbase + 4)?, depth + 1)?,
                offset: self.u32_at(mbase + 8)?,
            });
        }

        Ok(RdefType {
            class: self.u16_at(base)?,
            base_type: self.u16_at(base + 2)?,
            rows: self.u16_at(base + 4)?,
            columns: self.u16_at(base + 6)?,
            elements: self.u16_at(base + 8)?,
            members,
        })
    }
}
