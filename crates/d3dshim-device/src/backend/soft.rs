use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use d3dshim_dxbc::DxbcFile;
use hashbrown::HashMap;
use tracing::debug;

use super::{
    BackendError, BlendDesc, BufferDesc, BufferUsage, DepthStencilDesc, GpuBackend, InputElement,
    RasterizerDesc, SamplerDesc, ShaderStage, TextureDesc, TextureDimension, Topology,
    ViewDimension, Viewport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    Texture,
    ShaderResourceView,
    RenderTargetView,
    DepthStencilView,
    Shader,
    InputLayout,
    BlendState,
    RasterizerState,
    SamplerState,
    DepthStencilState,
}

/// Byte pattern a discard map leaves wherever the caller did not write.
pub const DISCARD_FILL: u8 = 0xCD;

/// One recorded context operation. Object references are recorded by id.
#[derive(Debug, Clone, PartialEq)]
pub enum SoftCommand {
    Map { buffer: u32 },
    SetVertexBuffer { buffer: u32, stride: u32 },
    SetIndexBuffer { buffer: u32 },
    SetInputLayout { layout: Option<u32> },
    SetTopology(Topology),
    SetShader { stage: ShaderStage, shader: Option<u32> },
    SetConstantBuffers { stage: ShaderStage, start_slot: u32, buffers: Vec<Option<u32>> },
    SetShaderResource { stage: ShaderStage, slot: u32, view: Option<u32> },
    SetSampler { stage: ShaderStage, slot: u32, sampler: u32 },
    SetBlendState(u32),
    SetRasterizerState(u32),
    SetDepthStencilState(u32),
    SetRenderTarget { color: Option<u32>, depth: Option<u32> },
    SetViewport(Viewport),
    Clear { view: u32, rgba: [f32; 4] },
    Draw { vertex_count: u32, start_vertex: u32 },
    DrawIndexed { index_count: u32, start_index: u32, base_vertex: i32 },
}

/// Shared view of the number of live backend objects; survives the backend itself.
#[derive(Debug, Clone)]
pub struct LiveObjects(Rc<Cell<usize>>);

impl LiveObjects {
    pub fn count(&self) -> usize {
        self.0.get()
    }
}

#[derive(Debug)]
struct LiveToken(Rc<Cell<usize>>);

impl LiveToken {
    fn new(counter: &Rc<Cell<usize>>) -> Self {
        counter.set(counter.get() + 1);
        Self(Rc::clone(counter))
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

#[derive(Debug)]
pub struct SoftBuffer {
    id: u32,
    desc: BufferDesc,
    contents: Rc<RefCell<Vec<u8>>>,
    _live: LiveToken,
}

impl SoftBuffer {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn desc(&self) -> BufferDesc {
        self.desc
    }

    pub fn contents(&self) -> Vec<u8> {
        self.contents.borrow().clone()
    }
}

#[derive(Debug)]
struct SoftObject<T> {
    id: u32,
    info: T,
    _live: LiveToken,
}

/// Reference-counted handle to a soft object; clones share the object.
pub struct SoftHandle<T>(Rc<SoftObject<T>>);

impl<T> SoftHandle<T> {
    pub fn id(&self) -> u32 {
        self.0.id
    }

    pub fn info(&self) -> &T {
        &self.0.info
    }
}

impl<T> Clone for SoftHandle<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for SoftHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftHandle")
            .field("id", &self.0.id)
            .field("info", &self.0.info)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftView {
    pub texture: u32,
    pub dimension: ViewDimension,
}

/// Deterministic in-memory backend.
///
/// Buffers keep their bytes in host memory and a map hands out a slice of exactly the
/// buffer's size, so an out-of-range write panics instead of corrupting anything. A discard
/// map fills the slice with [`DISCARD_FILL`] before the caller sees it. Context calls are
/// recorded as [`SoftCommand`]s in submission order.
#[derive(Debug)]
pub struct SoftGpuBackend {
    next_id: u32,
    live: Rc<Cell<usize>>,
    buffers: HashMap<u32, Weak<RefCell<Vec<u8>>>>,
    commands: Vec<SoftCommand>,
    map_counts: HashMap<u32, usize>,
    created: HashMap<ObjectKind, usize>,
    pending_failures: u32,
}

impl Default for SoftGpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftGpuBackend {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            live: Rc::new(Cell::new(0)),
            buffers: HashMap::new(),
            commands: Vec::new(),
            map_counts: HashMap::new(),
            created: HashMap::new(),
            pending_failures: 0,
        }
    }

    pub fn live_objects(&self) -> LiveObjects {
        LiveObjects(Rc::clone(&self.live))
    }

    pub fn commands(&self) -> &[SoftCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<SoftCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn map_count(&self, buffer_id: u32) -> usize {
        self.map_counts.get(&buffer_id).copied().unwrap_or(0)
    }

    /// Number of objects of `kind` created so far, including released ones.
    pub fn created(&self, kind: ObjectKind) -> usize {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    /// Reads back a live buffer by id.
    pub fn buffer_contents(&self, buffer_id: u32) -> Option<Vec<u8>> {
        let contents = self.buffers.get(&buffer_id)?.upgrade()?;
        let bytes = contents.borrow().clone();
        Some(bytes)
    }

    /// Makes the next `count` object creations fail.
    pub fn fail_next_creations(&mut self, count: u32) {
        self.pending_failures = count;
    }

    fn allocate_id(&mut self, kind: ObjectKind) -> Result<u32, BackendError> {
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            debug!(?kind, "soft backend: injected creation failure");
            return Err(BackendError::Internal("injected creation failure"));
        }
        *self.created.entry(kind).or_insert(0) += 1;
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    fn handle<T>(&mut self, kind: ObjectKind, info: T) -> Result<SoftHandle<T>, BackendError> {
        let id = self.allocate_id(kind)?;
        Ok(SoftHandle(Rc::new(SoftObject {
            id,
            info,
            _live: LiveToken::new(&self.live),
        })))
    }
}

/// Accepts a container whose shader chunk declares the program type of `stage`.
fn validate_bytecode(stage: ShaderStage, bytecode: &[u8]) -> Result<(), BackendError> {
    let file =
        DxbcFile::parse(bytecode).map_err(|e| BackendError::InvalidBytecode(e.to_string()))?;
    let chunk = file
        .find_first_shader_chunk()
        .ok_or_else(|| BackendError::InvalidBytecode("missing SHDR/SHEX chunk".into()))?;
    let version = chunk
        .data
        .get(..4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| BackendError::InvalidBytecode("truncated shader chunk".into()))?;
    let expected = match stage {
        ShaderStage::Pixel => 0,
        ShaderStage::Vertex => 1,
    };
    if version >> 16 != expected {
        return Err(BackendError::InvalidBytecode(format!(
            "program type {} does not match {stage:?} stage",
            version >> 16
        )));
    }
    Ok(())
}

impl GpuBackend for SoftGpuBackend {
    type Buffer = SoftBuffer;
    type Texture = SoftHandle<TextureDesc>;
    type ShaderResourceView = SoftHandle<SoftView>;
    type RenderTargetView = SoftHandle<SoftView>;
    type DepthStencilView = SoftHandle<SoftView>;
    type Shader = SoftHandle<ShaderStage>;
    type InputLayout = SoftHandle<Vec<InputElement>>;
    type BlendState = SoftHandle<BlendDesc>;
    type RasterizerState = SoftHandle<RasterizerDesc>;
    type SamplerState = SoftHandle<SamplerDesc>;
    type DepthStencilState = SoftHandle<DepthStencilDesc>;

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<SoftBuffer, BackendError> {
        if desc.size == 0 {
            return Err(BackendError::InvalidState("zero-sized buffer"));
        }
        let mut contents = vec![0u8; desc.size as usize];
        match (desc.usage, initial_data) {
            (BufferUsage::Immutable, None) => {
                return Err(BackendError::InvalidState("immutable buffer without data"));
            }
            (_, Some(data)) => contents
                .get_mut(..data.len())
                .ok_or(BackendError::OutOfBounds)?
                .copy_from_slice(data),
            (BufferUsage::Dynamic, None) => {}
        }

        let id = self.allocate_id(ObjectKind::Buffer)?;
        let contents = Rc::new(RefCell::new(contents));
        self.buffers.retain(|_, weak| weak.strong_count() > 0);
        self.buffers.insert(id, Rc::downgrade(&contents));
        Ok(SoftBuffer {
            id,
            desc: *desc,
            contents,
            _live: LiveToken::new(&self.live),
        })
    }

    fn map_write_discard(
        &mut self,
        buffer: &SoftBuffer,
        write: &mut dyn FnMut(&mut [u8]),
    ) -> Result<(), BackendError> {
        if buffer.desc.usage != BufferUsage::Dynamic {
            return Err(BackendError::InvalidState("buffer is not dynamic"));
        }
        // A second borrow here would mean a map is already open on this buffer.
        let mut contents = buffer
            .contents
            .try_borrow_mut()
            .map_err(|_| BackendError::InvalidState("buffer is already mapped"))?;
        *self.map_counts.entry(buffer.id).or_insert(0) += 1;
        self.commands.push(SoftCommand::Map { buffer: buffer.id });
        contents.fill(DISCARD_FILL);
        write(contents.as_mut_slice());
        Ok(())
    }

    fn create_shader(
        &mut self,
        stage: ShaderStage,
        bytecode: &[u8],
    ) -> Result<Self::Shader, BackendError> {
        validate_bytecode(stage, bytecode)?;
        self.handle(ObjectKind::Shader, stage)
    }

    fn create_input_layout(
        &mut self,
        elements: &[InputElement],
        vs_bytecode: &[u8],
    ) -> Result<Self::InputLayout, BackendError> {
        if elements.is_empty() {
            return Err(BackendError::InvalidState("empty input layout"));
        }
        validate_bytecode(ShaderStage::Vertex, vs_bytecode)?;
        self.handle(ObjectKind::InputLayout, elements.to_vec())
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<Self::Texture, BackendError> {
        if desc.width == 0 || desc.height == 0 || desc.depth == 0 {
            return Err(BackendError::InvalidState("zero-sized texture"));
        }
        if desc.dimension == TextureDimension::D2 && desc.depth != 1 {
            return Err(BackendError::InvalidState("2D texture with depth != 1"));
        }
        if desc.dimension == TextureDimension::D3
            && (desc.format.is_depth() || desc.render_target)
        {
            return Err(BackendError::Unsupported("volume texture as render or depth target"));
        }
        if initial_data.is_some_and(|data| data.len() < desc.byte_len()) {
            return Err(BackendError::OutOfBounds);
        }
        self.handle(ObjectKind::Texture, *desc)
    }

    fn texture_desc(&self, texture: &Self::Texture) -> TextureDesc {
        *texture.info()
    }

    fn create_shader_resource_view(
        &mut self,
        texture: &Self::Texture,
        dimension: ViewDimension,
    ) -> Result<Self::ShaderResourceView, BackendError> {
        let matches = matches!(
            (texture.info().dimension, dimension),
            (TextureDimension::D2, ViewDimension::Texture2D)
                | (TextureDimension::D3, ViewDimension::Texture3D)
        );
        if !matches {
            return Err(BackendError::InvalidState("view dimension does not match texture"));
        }
        self.handle(
            ObjectKind::ShaderResourceView,
            SoftView {
                texture: texture.id(),
                dimension,
            },
        )
    }

    fn create_render_target_view(
        &mut self,
        texture: &Self::Texture,
    ) -> Result<Self::RenderTargetView, BackendError> {
        let desc = texture.info();
        if !desc.render_target || desc.format.is_depth() {
            return Err(BackendError::InvalidState("texture is not color-renderable"));
        }
        self.handle(
            ObjectKind::RenderTargetView,
            SoftView {
                texture: texture.id(),
                dimension: ViewDimension::Texture2D,
            },
        )
    }

    fn create_depth_stencil_view(
        &mut self,
        texture: &Self::Texture,
    ) -> Result<Self::DepthStencilView, BackendError> {
        if !texture.info().format.is_depth() {
            return Err(BackendError::InvalidState("texture is not a depth format"));
        }
        self.handle(
            ObjectKind::DepthStencilView,
            SoftView {
                texture: texture.id(),
                dimension: ViewDimension::Texture2D,
            },
        )
    }

    fn create_blend_state(&mut self, desc: &BlendDesc) -> Result<Self::BlendState, BackendError> {
        self.handle(ObjectKind::BlendState, *desc)
    }

    fn create_rasterizer_state(
        &mut self,
        desc: &RasterizerDesc,
    ) -> Result<Self::RasterizerState, BackendError> {
        self.handle(ObjectKind::RasterizerState, *desc)
    }

    fn create_sampler_state(
        &mut self,
        desc: &SamplerDesc,
    ) -> Result<Self::SamplerState, BackendError> {
        self.handle(ObjectKind::SamplerState, *desc)
    }

    fn create_depth_stencil_state(
        &mut self,
        desc: &DepthStencilDesc,
    ) -> Result<Self::DepthStencilState, BackendError> {
        self.handle(ObjectKind::DepthStencilState, *desc)
    }

    fn set_vertex_buffer(&mut self, buffer: &SoftBuffer, stride: u32) {
        self.commands.push(SoftCommand::SetVertexBuffer {
            buffer: buffer.id,
            stride,
        });
    }

    fn set_index_buffer(&mut self, buffer: &SoftBuffer) {
        self.commands
            .push(SoftCommand::SetIndexBuffer { buffer: buffer.id });
    }

    fn set_input_layout(&mut self, layout: Option<&Self::InputLayout>) {
        self.commands.push(SoftCommand::SetInputLayout {
            layout: layout.map(SoftHandle::id),
        });
    }

    fn set_primitive_topology(&mut self, topology: Topology) {
        self.commands.push(SoftCommand::SetTopology(topology));
    }

    fn set_shader(&mut self, stage: ShaderStage, shader: Option<&Self::Shader>) {
        self.commands.push(SoftCommand::SetShader {
            stage,
            shader: shader.map(SoftHandle::id),
        });
    }

    fn set_constant_buffers(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        buffers: &[Option<&SoftBuffer>],
    ) {
        self.commands.push(SoftCommand::SetConstantBuffers {
            stage,
            start_slot,
            buffers: buffers.iter().map(|b| b.map(SoftBuffer::id)).collect(),
        });
    }

    fn set_shader_resource(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        view: Option<&Self::ShaderResourceView>,
    ) {
        self.commands.push(SoftCommand::SetShaderResource {
            stage,
            slot,
            view: view.map(SoftHandle::id),
        });
    }

    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: &Self::SamplerState) {
        self.commands.push(SoftCommand::SetSampler {
            stage,
            slot,
            sampler: sampler.id(),
        });
    }

    fn set_blend_state(&mut self, state: &Self::BlendState) {
        self.commands.push(SoftCommand::SetBlendState(state.id()));
    }

    fn set_rasterizer_state(&mut self, state: &Self::RasterizerState) {
        self.commands
            .push(SoftCommand::SetRasterizerState(state.id()));
    }

    fn set_depth_stencil_state(&mut self, state: &Self::DepthStencilState) {
        self.commands
            .push(SoftCommand::SetDepthStencilState(state.id()));
    }

    fn set_render_target(
        &mut self,
        color: Option<&Self::RenderTargetView>,
        depth: Option<&Self::DepthStencilView>,
    ) {
        self.commands.push(SoftCommand::SetRenderTarget {
            color: color.map(SoftHandle::id),
            depth: depth.map(SoftHandle::id),
        });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(SoftCommand::SetViewport(viewport));
    }

    fn clear_render_target(&mut self, view: &Self::RenderTargetView, rgba: [f32; 4]) {
        self.commands.push(SoftCommand::Clear {
            view: view.id(),
            rgba,
        });
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        self.commands.push(SoftCommand::Draw {
            vertex_count,
            start_vertex,
        });
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        self.commands.push(SoftCommand::DrawIndexed {
            index_count,
            start_index,
            base_vertex,
        });
    }
}
