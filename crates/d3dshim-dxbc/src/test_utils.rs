use crate::FourCC;

/// Packed target token for `ps_4_0`.
pub const TARGET_PS_4_0: u32 = 0xFFFF_0040;
/// Packed target token for `vs_4_0`.
pub const TARGET_VS_4_0: u32 = 0xFFFE_0040;

/// Builds a structurally valid container holding `chunks` in order.
///
/// The checksum is left zeroed; the parser does not validate it.
pub fn build_container(chunks: &[(FourCC, &[u8])]) -> Vec<u8> {
    let table_len = 4 * chunks.len();
    let mut out = Vec::new();
    out.extend_from_slice(&FourCC::DXBC.0);
    out.extend_from_slice(&[0u8; 16]);
    push_u32(&mut out, 1);
    push_u32(&mut out, 0); // total_size, patched below
    push_u32(&mut out, len_u32(chunks.len()));
    out.resize(out.len() + table_len, 0);

    for (i, (fourcc, data)) in chunks.iter().enumerate() {
        let offset = len_u32(out.len());
        out[32 + 4 * i..36 + 4 * i].copy_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&fourcc.0);
        push_u32(&mut out, len_u32(data.len()));
        out.extend_from_slice(data);
    }

    let total = len_u32(out.len());
    out[24..28].copy_from_slice(&total.to_le_bytes());
    out
}

/// A minimal SM4 token stream: version token followed by the length token.
///
/// `program_type` is `0` for pixel shaders and `1` for vertex shaders.
pub fn minimal_shader_tokens(program_type: u16) -> Vec<u8> {
    let version = (u32::from(program_type) << 16) | 0x40;
    let mut out = Vec::with_capacity(8);
    push_u32(&mut out, version);
    push_u32(&mut out, 2);
    out
}

/// Builds a container with a shader chunk and, when given, an `RDEF` chunk.
pub fn shader_container(program_type: u16, rdef: Option<&[u8]>) -> Vec<u8> {
    let tokens = minimal_shader_tokens(program_type);
    match rdef {
        Some(rdef) => build_container(&[(FourCC::RDEF, rdef), (FourCC::SHDR, &tokens)]),
        None => build_container(&[(FourCC::SHDR, &tokens)]),
    }
}

/// Description of one variable for [`RdefBuilder`].
#[derive(Debug, Clone)]
pub struct RdefVariableSpec {
    /// Variable name.
    pub name: String,
    /// Byte offset in the buffer.
    pub offset: u32,
    /// Size in bytes.
    pub size: u32,
    /// Raw type class.
    pub class: u16,
    /// Rows.
    pub rows: u16,
    /// Columns.
    pub columns: u16,
}

impl RdefVariableSpec {
    /// A `float`.
    pub fn scalar(name: &str, offset: u32) -> Self {
        Self {
            name: name.to_owned(),
            offset,
            size: 4,
            class: 0,
            rows: 1,
            columns: 1,
        }
    }

    /// A `floatN` with `components` in `1..=4`.
    pub fn vector(name: &str, offset: u32, components: u16) -> Self {
        Self {
            name: name.to_owned(),
            offset,
            size: 4 * u32::from(components),
            class: 1,
            rows: 1,
            columns: components,
        }
    }

    /// A `floatRxC`, laid out the way the compiler packs it (one register per storage
    /// column or row, the last one possibly partial).
    pub fn matrix(name: &str, offset: u32, rows: u16, columns: u16, column_major: bool) -> Self {
        let (registers, width) = if column_major {
            (columns, rows)
        } else {
            (rows, columns)
        };
        Self {
            name: name.to_owned(),
            offset,
            size: 16 * (u32::from(registers) - 1) + 4 * u32::from(width),
            class: if column_major { 3 } else { 2 },
            rows,
            columns,
        }
    }

    /// Any other class (structs, objects).
    pub fn other(name: &str, offset: u32, size: u32, class: u16) -> Self {
        Self {
            name: name.to_owned(),
            offset,
            size,
            class,
            rows: 0,
            columns: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct CbufferSpec {
    name: String,
    size: u32,
    variables: Vec<RdefVariableSpec>,
}

#[derive(Debug, Clone)]
struct BindingSpec {
    name: String,
    input_type: u32,
    bind_point: u32,
}

/// Builds `RDEF` chunk payloads for tests.
#[derive(Debug, Clone)]
pub struct RdefBuilder {
    target: u32,
    creator: Option<String>,
    cbuffers: Vec<CbufferSpec>,
    bindings: Vec<BindingSpec>,
}

impl Default for RdefBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RdefBuilder {
    /// Starts an empty `ps_4_0` chunk.
    pub fn new() -> Self {
        Self {
            target: TARGET_PS_4_0,
            creator: None,
            cbuffers: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Overrides the target token.
    pub fn target(mut self, target: u32) -> Self {
        self.target = target;
        self
    }

    /// Sets the creator string.
    pub fn creator(mut self, creator: &str) -> Self {
        self.creator = Some(creator.to_owned());
        self
    }

    /// Appends a constant buffer. A matching binding entry is not added automatically.
    pub fn constant_buffer(mut self, name: &str, size: u32, variables: Vec<RdefVariableSpec>) -> Self {
        self.cbuffers.push(CbufferSpec {
            name: name.to_owned(),
            size,
            variables,
        });
        self
    }

    /// Appends a bound resource with a single slot.
    pub fn resource(mut self, name: &str, input_type: u32, bind_point: u32) -> Self {
        self.bindings.push(BindingSpec {
            name: name.to_owned(),
            input_type,
            bind_point,
        });
        self
    }

    /// Serializes the chunk payload.
    pub fn build(&self) -> Vec<u8> {
        let var_desc_len = if (self.target & 0xF0) >= 0x50 { 40 } else { 24 };
        let var_total: usize = self.cbuffers.iter().map(|cb| cb.variables.len()).sum();

        // Fixed-size tables first, strings last.
        let cb_table = 28;
        let binding_table = cb_table + 24 * self.cbuffers.len();
        let mut cursor = binding_table + 32 * self.bindings.len();
        let mut var_tables = Vec::with_capacity(self.cbuffers.len());
        for cb in &self.cbuffers {
            var_tables.push(cursor);
            cursor += var_desc_len * cb.variables.len();
        }
        let type_table = cursor;
        let mut strings = StringTable::new(type_table + 16 * var_total);

        let creator = self.creator.as_deref().map(|c| strings.add(c)).unwrap_or(0);
        let cb_names: Vec<u32> = self.cbuffers.iter().map(|cb| strings.add(&cb.name)).collect();
        let binding_names: Vec<u32> = self.bindings.iter().map(|b| strings.add(&b.name)).collect();
        let var_names: Vec<u32> = self
            .cbuffers
            .iter()
            .flat_map(|cb| cb.variables.iter())
            .map(|v| strings.add(&v.name))
            .collect();

        let mut out = Vec::with_capacity(strings.end());
        push_u32(&mut out, len_u32(self.cbuffers.len()));
        push_u32(&mut out, len_u32(cb_table));
        push_u32(&mut out, len_u32(self.bindings.len()));
        push_u32(&mut out, len_u32(binding_table));
        push_u32(&mut out, self.target);
        push_u32(&mut out, 0);
        push_u32(&mut out, creator);

        for ((cb, name), table) in self.cbuffers.iter().zip(&cb_names).zip(&var_tables) {
            push_u32(&mut out, *name);
            push_u32(&mut out, len_u32(cb.variables.len()));
            push_u32(&mut out, len_u32(*table));
            push_u32(&mut out, cb.size);
            push_u32(&mut out, 0);
            push_u32(&mut out, 0);
        }

        for (binding, name) in self.bindings.iter().zip(&binding_names) {
            push_u32(&mut out, *name);
            push_u32(&mut out, binding.input_type);
            push_u32(&mut out, 0);
            push_u32(&mut out, 0);
            push_u32(&mut out, 0);
            push_u32(&mut out, binding.bind_point);
            push_u32(&mut out, 1);
            push_u32(&mut out, 0);
        }

        let variables = self.cbuffers.iter().flat_map(|cb| cb.variables.iter());
        for (i, (var, name)) in variables.clone().zip(&var_names).enumerate() {
            push_u32(&mut out, *name);
            push_u32(&mut out, var.offset);
            push_u32(&mut out, var.size);
            push_u32(&mut out, 2);
            push_u32(&mut out, len_u32(type_table + 16 * i));
            push_u32(&mut out, 0);
            out.resize(out.len() + (var_desc_len - 24), 0);
        }

        for var in variables {
            push_u16(&mut out, var.class);
            push_u16(&mut out, 3); // float
            push_u16(&mut out, var.rows);
            push_u16(&mut out, var.columns);
            push_u16(&mut out, 0);
            push_u16(&mut out, 0);
            push_u32(&mut out, 0);
        }

        debug_assert_eq!(out.len(), type_table + 16 * var_total);
        out.extend_from_slice(&strings.bytes);
        out
    }
}

struct StringTable {
    base: usize,
    bytes: Vec<u8>,
}

impl StringTable {
    fn new(base: usize) -> Self {
        Self {
            base,
            bytes: Vec::new(),
        }
    }

    fn add(&mut self, s: &str) -> u32 {
        let offset = len_u32(self.base + self.bytes.len());
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        offset
    }

    fn end(&self) -> usize {
        self.base + self.bytes.len()
    }
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn len_u32(len: usize) -> u32 {
    u32::try_from(len).expect("test blob does not fit in u32")
}
