//! Name-addressed shader constants.
//!
//! A [`ShaderReflectionTable`] is built from the `RDEF` chunk of a compiled shader. It owns one
//! dynamic constant buffer per reflected `cbuffer` and a CPU shadow per variable. Writes by
//! name only touch the shadows; [`ShaderReflectionTable::apply_changes`] pushes dirty buffers
//! to the GPU right before a draw.

use std::cell::RefCell;
use std::rc::Rc;

use d3dshim_dxbc::{DxbcError, DxbcFile, RdefChunk, ShaderInputType, VariableClass};
use hashbrown::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::backend::{BackendError, BindFlags, BufferDesc, BufferUsage, GpuBackend};
use crate::transform::Matrix4;

/// Constant-buffer slots per shader stage.
pub const MAX_CONSTANT_BUFFER_SLOTS: usize = 14;

const REGISTER_BYTES: usize = 16;

/// Reflection tables are shared by every draw using the owning shader.
pub type SharedReflectionTable<B> = Rc<RefCell<ShaderReflectionTable<B>>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReflectionError {
    #[error("shader bytecode is not a valid container: {0}")]
    Container(#[source] DxbcError),
    #[error("shader bytecode has no resource definition chunk")]
    MissingReflection,
    #[error("malformed resource definition chunk: {0}")]
    Malformed(#[source] DxbcError),
    #[error("shader declares {count} constant buffers, a stage has {max} slots", max = MAX_CONSTANT_BUFFER_SLOTS)]
    TooManyConstantBuffers { count: usize },
    #[error(
        "variable `{variable}` at {offset}+{size} exceeds constant buffer `{buffer}` of {buffer_size} bytes"
    )]
    VariableOutOfRange {
        buffer: String,
        variable: String,
        offset: u32,
        size: u32,
        buffer_size: u32,
    },
    #[error("failed to create constant buffer `{name}`: {source}")]
    BufferCreation {
        name: String,
        #[source]
        source: BackendError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstantError {
    #[error("variable `{name}` is a {actual:?}, cannot write a {expected:?}")]
    TypeMismatch {
        name: String,
        expected: TypeClass,
        actual: TypeClass,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Scalar,
    Vector,
    Matrix,
    /// Structs, objects. Rejects every typed write.
    Other,
}

/// Register layout of a reflected matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixOrder {
    /// One register per row (`row_major`).
    RowMajor,
    /// One register per column; the compiler default.
    ColumnMajor,
}

/// Stable reference to a variable, valid for the table that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableHandle {
    buffer: usize,
    variable: usize,
}

/// Stable reference to a resource binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingHandle(usize);

#[derive(Debug, Clone)]
pub struct ShaderVariable {
    name: String,
    offset: u32,
    size: u32,
    class: TypeClass,
    order: MatrixOrder,
    rows: u16,
    columns: u16,
    dirty: bool,
    shadow: Option<Vec<u8>>,
}

impl ShaderVariable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn class(&self) -> TypeClass {
        self.class
    }

    /// Meaningful only for [`TypeClass::Matrix`].
    pub fn matrix_order(&self) -> MatrixOrder {
        self.order
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// `None` until the first write.
    pub fn shadow(&self) -> Option<&[u8]> {
        self.shadow.as_deref()
    }

    fn expect_class(&self, expected: TypeClass) -> Result<(), ConstantError> {
        if self.class == expected {
            Ok(())
        } else {
            Err(ConstantError::TypeMismatch {
                name: self.name.clone(),
                expected,
                actual: self.class,
            })
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        let size = self.size as usize;
        let shadow = self.shadow.get_or_insert_with(|| vec![0; size]);
        let len = bytes.len().min(shadow.len());
        shadow[..len].copy_from_slice(&bytes[..len]);
        self.dirty = true;
    }
}

pub struct ConstantBuffer<B: GpuBackend> {
    name: String,
    size: u32,
    buffer: B::Buffer,
    variables: Vec<ShaderVariable>,
}

impl<B: GpuBackend> ConstantBuffer<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn buffer(&self) -> &B::Buffer {
        &self.buffer
    }

    pub fn variables(&self) -> &[ShaderVariable] {
        &self.variables
    }

    fn is_dirty(&self) -> bool {
        self.variables.iter().any(|v| v.dirty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    pub name: String,
    pub input_type: ShaderInputType,
    pub bind_point: u32,
    pub bind_count: u32,
}

pub struct ShaderReflectionTable<B: GpuBackend> {
    constant_buffers: Vec<ConstantBuffer<B>>,
    bindings: Vec<ResourceBinding>,
    variables_by_name: HashMap<String, VariableHandle>,
    bindings_by_name: HashMap<String, BindingHandle>,
}

impl<B: GpuBackend> ShaderReflectionTable<B> {
    /// Reflects `bytecode` and allocates its constant buffers. Fails as a unit.
    pub fn reflect(backend: &mut B, bytecode: &[u8]) -> Result<Self, ReflectionError> {
        let file = DxbcFile::parse(bytecode).map_err(ReflectionError::Container)?;
        let rdef = file
            .get_rdef()
            .ok_or(ReflectionError::MissingReflection)?
            .map_err(ReflectionError::Malformed)?;
        Self::from_rdef(backend, &rdef)
    }

    pub fn from_rdef(backend: &mut B, rdef: &RdefChunk) -> Result<Self, ReflectionError> {
        if rdef.constant_buffers.len() > MAX_CONSTANT_BUFFER_SLOTS {
            return Err(ReflectionError::TooManyConstantBuffers {
                count: rdef.constant_buffers.len(),
            });
        }

        // Validate every layout before allocating anything.
        for cb in &rdef.constant_buffers {
            for var in &cb.variables {
                let end = u64::from(var.offset) + u64::from(var.size);
                if end > u64::from(cb.size) {
                    return Err(ReflectionError::VariableOutOfRange {
                        buffer: cb.name.clone(),
                        variable: var.name.clone(),
                        offset: var.offset,
                        size: var.size,
                        buffer_size: cb.size,
                    });
                }
            }
        }

        let mut constant_buffers = Vec::with_capacity(rdef.constant_buffers.len());
        let mut variables_by_name = HashMap::new();
        for (buffer_index, cb) in rdef.constant_buffers.iter().enumerate() {
            let desc = BufferDesc {
                size: cb.size,
                bind: BindFlags::CONSTANT_BUFFER,
                usage: BufferUsage::Dynamic,
            };
            let buffer = backend
                .create_buffer(&desc, None)
                .map_err(|source| ReflectionError::BufferCreation {
                    name: cb.name.clone(),
                    source,
                })?;

            let mut variables = Vec::with_capacity(cb.variables.len());
            for (variable_index, var) in cb.variables.iter().enumerate() {
                let (class, order) = match var.ty.class() {
                    VariableClass::Scalar => (TypeClass::Scalar, MatrixOrder::ColumnMajor),
                    VariableClass::Vector => (TypeClass::Vector, MatrixOrder::ColumnMajor),
                    VariableClass::MatrixRows => (TypeClass::Matrix, MatrixOrder::RowMajor),
                    VariableClass::MatrixColumns => (TypeClass::Matrix, MatrixOrder::ColumnMajor),
                    VariableClass::Other(_) => (TypeClass::Other, MatrixOrder::ColumnMajor),
                };
                // First declaration wins when a name repeats across buffers.
                variables_by_name
                    .entry(var.name.clone())
                    .or_insert(VariableHandle {
                        buffer: buffer_index,
                        variable: variable_index,
                    });
                variables.push(ShaderVariable {
                    name: var.name.clone(),
                    offset: var.offset,
                    size: var.size,
                    class,
                    order,
                    rows: var.ty.rows,
                    columns: var.ty.columns,
                    dirty: false,
                    shadow: None,
                });
            }

            constant_buffers.push(ConstantBuffer {
                name: cb.name.clone(),
                size: cb.size,
                buffer,
                variables,
            });
        }

        let bindings: Vec<ResourceBinding> = rdef
            .bound_resources
            .iter()
            .map(|b| ResourceBinding {
                name: b.name.clone(),
                input_type: b.kind(),
                bind_point: b.bind_point,
                bind_count: b.bind_count,
            })
            .collect();
        let mut bindings_by_name = HashMap::new();
        for (index, binding) in bindings.iter().enumerate() {
            bindings_by_name
                .entry(binding.name.clone())
                .or_insert(BindingHandle(index));
        }

        debug!(
            constant_buffers = constant_buffers.len(),
            variables = variables_by_name.len(),
            bindings = bindings.len(),
            "reflected shader constants"
        );

        Ok(Self {
            constant_buffers,
            bindings,
            variables_by_name,
            bindings_by_name,
        })
    }

    pub fn into_shared(self) -> SharedReflectionTable<B> {
        Rc::new(RefCell::new(self))
    }

    pub fn get_variable_by_name(&self, name: &str) -> Option<VariableHandle> {
        self.variables_by_name.get(name).copied()
    }

    /// Variables are indexed in declaration order across all constant buffers.
    pub fn get_variable_by_index(&self, index: usize) -> Option<VariableHandle> {
        let mut remaining = index;
        for (buffer, cb) in self.constant_buffers.iter().enumerate() {
            if remaining < cb.variables.len() {
                return Some(VariableHandle {
                    buffer,
                    variable: remaining,
                });
            }
            remaining -= cb.variables.len();
        }
        None
    }

    pub fn variable(&self, handle: VariableHandle) -> Option<&ShaderVariable> {
        self.constant_buffers
            .get(handle.buffer)?
            .variables
            .get(handle.variable)
    }

    pub fn variable_count(&self) -> usize {
        self.constant_buffers.iter().map(|cb| cb.variables.len()).sum()
    }

    pub fn get_binding_by_index(&self, index: usize) -> Option<&ResourceBinding> {
        self.bindings.get(index)
    }

    pub fn get_binding_by_name(&self, name: &str) -> Option<&ResourceBinding> {
        self.binding(self.binding_handle(name)?)
    }

    /// Resolves a binding once so per-frame code can skip the name lookup.
    pub fn binding_handle(&self, name: &str) -> Option<BindingHandle> {
        self.bindings_by_name.get(name).copied()
    }

    pub fn binding(&self, handle: BindingHandle) -> Option<&ResourceBinding> {
        self.bindings.get(handle.0)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn constant_buffers(&self) -> &[ConstantBuffer<B>] {
        &self.constant_buffers
    }

    /// Buffers in bind order starting at slot 0, and how many slots are used.
    pub fn constant_buffer_slots(&self) -> ([Option<&B::Buffer>; MAX_CONSTANT_BUFFER_SLOTS], usize) {
        let mut slots = [None; MAX_CONSTANT_BUFFER_SLOTS];
        for (slot, cb) in slots.iter_mut().zip(&self.constant_buffers) {
            *slot = Some(&cb.buffer);
        }
        (slots, self.constant_buffers.len())
    }

    /// Writes `value` into a vector variable. Unknown names are ignored.
    pub fn set_vector(&mut self, name: &str, value: &[f32; 4]) -> Result<(), ConstantError> {
        match self.get_variable_by_name(name) {
            Some(handle) => self.set_vector_at(handle, value),
            None => Ok(()),
        }
    }

    pub fn set_vector_at(
        &mut self,
        handle: VariableHandle,
        value: &[f32; 4],
    ) -> Result<(), ConstantError> {
        let Some(var) = self.variable_mut(handle) else {
            return Ok(());
        };
        var.expect_class(TypeClass::Vector)?;
        var.write(bytemuck::bytes_of(value));
        Ok(())
    }

    /// Writes a row-major `matrix` into a matrix variable, repacked to its register layout.
    pub fn set_matrix(&mut self, name: &str, matrix: &Matrix4) -> Result<(), ConstantError> {
        match self.get_variable_by_name(name) {
            Some(handle) => self.set_matrix_at(handle, matrix),
            None => Ok(()),
        }
    }

    pub fn set_matrix_at(
        &mut self,
        handle: VariableHandle,
        matrix: &Matrix4,
    ) -> Result<(), ConstantError> {
        let Some(var) = self.variable_mut(handle) else {
            return Ok(());
        };
        var.expect_class(TypeClass::Matrix)?;
        let packed = pack_matrix(matrix, var.order, var.rows, var.columns);
        var.write(&packed);
        Ok(())
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> Result<(), ConstantError> {
        match self.get_variable_by_name(name) {
            Some(handle) => self.set_float_at(handle, value),
            None => Ok(()),
        }
    }

    pub fn set_float_at(&mut self, handle: VariableHandle, value: f32) -> Result<(), ConstantError> {
        let Some(var) = self.variable_mut(handle) else {
            return Ok(());
        };
        var.expect_class(TypeClass::Scalar)?;
        var.write(bytemuck::bytes_of(&value));
        Ok(())
    }

    /// Uploads every constant buffer holding a dirty variable.
    ///
    /// Mapping discards the previous contents, so all written variables of a flushed buffer
    /// are copied again, not only the dirty ones. Clean buffers are not mapped.
    pub fn apply_changes(&mut self, backend: &mut B) -> Result<(), BackendError> {
        for cb in &mut self.constant_buffers {
            if !cb.is_dirty() {
                continue;
            }
            let variables = &cb.variables;
            backend.map_write_discard(&cb.buffer, &mut |mapped| {
                for var in variables {
                    let Some(shadow) = var.shadow.as_deref() else {
                        continue;
                    };
                    let start = var.offset as usize;
                    if let Some(dst) = mapped.get_mut(start..start + shadow.len()) {
                        dst.copy_from_slice(shadow);
                    }
                }
            })?;
            for var in &mut cb.variables {
                var.dirty = false;
            }
        }
        Ok(())
    }

    fn variable_mut(&mut self, handle: VariableHandle) -> Option<&mut ShaderVariable> {
        self.constant_buffers
            .get_mut(handle.buffer)?
            .variables
            .get_mut(handle.variable)
    }
}

/// Packs `m` one 16-byte register per storage column (column-major) or row (row-major).
///
/// Only the first `rows`×`columns` elements are meaningful; register padding is zero. The
/// caller truncates to the variable's declared size.
fn pack_matrix(m: &Matrix4, order: MatrixOrder, rows: u16, columns: u16) -> Vec<u8> {
    let rows = usize::from(rows.clamp(1, 4));
    let columns = usize::from(columns.clamp(1, 4));
    let (registers, width) = match order {
        MatrixOrder::ColumnMajor => (columns, rows),
        MatrixOrder::RowMajor => (rows, columns),
    };

    let mut out = vec![0u8; registers * REGISTER_BYTES];
    for register in 0..registers {
        for lane in 0..width {
            let value = match order {
                MatrixOrder::ColumnMajor => m[lane][register],
                MatrixOrder::RowMajor => m[register][lane],
            };
            let at = register * REGISTER_BYTES + lane * 4;
            out[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }
    }
    out
}
