//! Immediate-mode draw shim.
//!
//! [`DeviceShim`] accepts "primitive type + count + raw vertices" draws and turns each one into
//! the explicit sequence the backend needs: flush deferred constants, upload into fixed-size
//! dynamic buffers, bind, draw. Triangle fans are drawn as triangle lists through a shared,
//! precomputed index buffer.

use tracing::{debug, warn};

use crate::backend::{
    BackendError, BindFlags, BufferDesc, BufferUsage, GpuBackend, ShaderStage, TextureDesc,
    TextureDimension, TextureFormat, ViewDimension, Viewport,
};
use crate::config::ShimConfig;
use crate::error::ShimError;
use crate::reflection::{SharedReflectionTable, ShaderReflectionTable};
use crate::shader::{BuiltinShader, BuiltinShaderBytecode, PixelShader, VertexShader};
use crate::state::{
    build_fan_indices, depth_desc, expand_triangle_fan_u16, fan_vertex_capacity,
    translate_blend, translate_primitive_topology, translate_rasterizer, translate_sampler,
    PrimitiveType, StateCache,
};
use crate::transform::{Matrix4, TransformBlock, TransformKind, TransformState};
use crate::vertex::{PerFormat, Vertex, VertexFormat, MAX_VERTEX_STRIDE};

/// Texture and sampler slots addressable through the shim.
pub const MAX_TEXTURE_SLOTS: u32 = 16;

/// Slot of the transform constant buffer on the default vertex shader.
const TRANSFORM_SLOT: u32 = 0;

/// How [`DeviceShim::set_render_target`] treats the depth view.
pub enum DepthBinding<'a, B: GpuBackend> {
    /// Keep whatever depth view is currently bound.
    Keep,
    Use(&'a B::DepthStencilView),
    Detach,
}

struct RenderTarget<B: GpuBackend> {
    color: Option<B::RenderTargetView>,
    depth: Option<B::DepthStencilView>,
    viewport: Viewport,
}

impl<B: GpuBackend> Clone for RenderTarget<B> {
    fn clone(&self) -> Self {
        Self {
            color: self.color.clone(),
            depth: self.depth.clone(),
            viewport: self.viewport,
        }
    }
}

pub struct DeviceShim<B: GpuBackend> {
    config: ShimConfig,

    vertex_capacity: u32,
    index_capacity: u32,
    fan_vertex_capacity: u32,
    vertex_buffer: B::Buffer,
    index_buffer: B::Buffer,
    fan_index_buffer: B::Buffer,

    transform: TransformState,
    transform_buffer: B::Buffer,

    builtin_vs: B::Shader,
    builtin_layouts: PerFormat<B::InputLayout>,
    builtin_ps: [B::Shader; 4],
    builtin: BuiltinShader,
    vertex_format: VertexFormat,
    vertex_shader: Option<VertexShader<B>>,
    pixel_shader: Option<PixelShader<B>>,

    states: StateCache<B>,
    textures: Vec<Option<B::ShaderResourceView>>,
    render_target: RenderTarget<B>,
    render_target_stack: Vec<RenderTarget<B>>,

    backend: B,
}

impl<B: GpuBackend> DeviceShim<B> {
    /// Allocates the geometry buffers, the fan index buffer and the transform block, and loads
    /// the fallback shaders.
    pub fn new(
        mut backend: B,
        config: ShimConfig,
        shaders: &BuiltinShaderBytecode<'_>,
    ) -> Result<Self, ShimError> {
        let vertex_capacity = config.clamped_vertex_capacity();
        if vertex_capacity != config.vertex_capacity {
            debug!(
                requested = config.vertex_capacity,
                vertex_capacity, "vertex capacity clamped"
            );
        }
        let index_capacity = vertex_capacity / 6;
        let fan_vertices = fan_vertex_capacity(vertex_capacity);

        let vertex_buffer = backend
            .create_buffer(
                &BufferDesc {
                    size: vertex_capacity * MAX_VERTEX_STRIDE,
                    bind: BindFlags::VERTEX_BUFFER,
                    usage: BufferUsage::Dynamic,
                },
                None,
            )
            .map_err(ShimError::creation("vertex buffer"))?;
        let index_buffer = backend
            .create_buffer(
                &BufferDesc {
                    size: index_capacity * 2,
                    bind: BindFlags::INDEX_BUFFER,
                    usage: BufferUsage::Dynamic,
                },
                None,
            )
            .map_err(ShimError::creation("index buffer"))?;

        let fan_indices = build_fan_indices(fan_vertices);
        let fan_bytes: &[u8] = bytemuck::cast_slice(&fan_indices);
        let fan_index_buffer = backend
            .create_buffer(
                &BufferDesc {
                    size: fan_bytes.len() as u32,
                    bind: BindFlags::INDEX_BUFFER,
                    usage: BufferUsage::Immutable,
                },
                Some(fan_bytes),
            )
            .map_err(ShimError::creation("fan index buffer"))?;

        let transform = TransformState::new();
        let transform_buffer = backend
            .create_buffer(
                &BufferDesc {
                    size: TransformBlock::SIZE,
                    bind: BindFlags::CONSTANT_BUFFER,
                    usage: BufferUsage::Dynamic,
                },
                Some(bytemuck::bytes_of(transform.block())),
            )
            .map_err(ShimError::creation("transform buffer"))?;

        let builtin_vs = backend
            .create_shader(ShaderStage::Vertex, shaders.transform_vs)
            .map_err(ShimError::creation("default vertex shader"))?;
        let mut layout = |format: VertexFormat| {
            backend
                .create_input_layout(format.input_elements(), shaders.transform_vs)
                .map_err(ShimError::creation("input layout"))
        };
        let builtin_layouts = PerFormat::new([
            layout(VertexFormat::Color)?,
            layout(VertexFormat::Textured)?,
            layout(VertexFormat::DualTextured)?,
        ]);
        let mut pixel = |shader: BuiltinShader| {
            backend
                .create_shader(ShaderStage::Pixel, shaders.pixel(shader))
                .map_err(ShimError::creation("fallback pixel shader"))
        };
        let builtin_ps = [
            pixel(BuiltinShader::Diffuse)?,
            pixel(BuiltinShader::Textured)?,
            pixel(BuiltinShader::Flat)?,
            pixel(BuiltinShader::DualTextured)?,
        ];

        debug!(
            vertex_capacity,
            index_capacity,
            fan_vertices,
            "initialized device shim"
        );

        let mut shim = Self {
            config,
            vertex_capacity,
            index_capacity,
            fan_vertex_capacity: fan_vertices,
            vertex_buffer,
            index_buffer,
            fan_index_buffer,
            transform,
            transform_buffer,
            builtin_vs,
            builtin_layouts,
            builtin_ps,
            builtin: BuiltinShader::Diffuse,
            vertex_format: VertexFormat::Color,
            vertex_shader: None,
            pixel_shader: None,
            states: StateCache::new(),
            textures: (0..MAX_TEXTURE_SLOTS).map(|_| None).collect(),
            render_target: RenderTarget {
                color: None,
                depth: None,
                viewport: Viewport::default(),
            },
            render_target_stack: Vec::new(),
            backend,
        };
        shim.bind_default_vertex_shader();
        shim.bind_fallback_pixel_shader();
        Ok(shim)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    /// Vertices the vertex buffer holds.
    pub fn vertex_capacity(&self) -> u32 {
        self.vertex_capacity
    }

    /// 16-bit indices the index buffer holds.
    pub fn index_capacity(&self) -> u32 {
        self.index_capacity
    }

    /// Largest fan, in vertices, drawn without clamping.
    pub fn fan_vertex_capacity(&self) -> u32 {
        self.fan_vertex_capacity
    }

    pub fn vertex_buffer(&self) -> &B::Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &B::Buffer {
        &self.index_buffer
    }

    pub fn fan_index_buffer(&self) -> &B::Buffer {
        &self.fan_index_buffer
    }

    pub fn transform_buffer(&self) -> &B::Buffer {
        &self.transform_buffer
    }

    pub fn state_cache(&self) -> &StateCache<B> {
        &self.states
    }

    pub fn render_target_stack_depth(&self) -> usize {
        self.render_target_stack.len()
    }

    // -- Draws -------------------------------------------------------------------------------

    /// Draws `count` primitives from `vertex_data`, laid out with `stride` bytes per vertex.
    ///
    /// Geometry beyond the buffer capacity or beyond the end of `vertex_data` is dropped, and
    /// only whole primitives are drawn. Strides of zero or wider than [`MAX_VERTEX_STRIDE`] skip
    /// the draw.
    pub fn draw_primitive(
        &mut self,
        primitive: PrimitiveType,
        count: u32,
        vertex_data: &[u8],
        stride: u32,
    ) -> Result<(), ShimError> {
        if !self.accepts_stride(stride) {
            return Ok(());
        }
        self.flush_constants()?;

        let translation = translate_primitive_topology(primitive);
        let limit = if translation.needs_triangle_fan_emulation {
            self.fan_vertex_capacity
        } else {
            self.vertex_capacity
        };
        let wanted = primitive.verts_from_prim_count(count);
        if wanted > limit {
            self.report_clamp("vertices", "capacity", wanted as usize, limit as usize);
        }
        let uploaded = self.upload_vertices(vertex_data, stride, wanted.min(limit))?;
        let primitives = primitive.prim_count_from_verts(uploaded);
        if primitives == 0 {
            debug!(%primitive, count, uploaded, "no whole primitive to draw");
            return Ok(());
        }

        self.backend.set_vertex_buffer(&self.vertex_buffer, stride);
        if translation.needs_triangle_fan_emulation {
            self.backend.set_index_buffer(&self.fan_index_buffer);
            self.backend.set_primitive_topology(translation.topology);
            self.backend.draw_indexed(3 * primitives, 0, 0);
        } else {
            self.backend.set_primitive_topology(translation.topology);
            self.backend
                .draw(primitive.verts_from_prim_count(primitives), 0);
        }
        Ok(())
    }

    /// Indexed draw of `primitive_count` primitives. `vertex_count` vertices are uploaded from
    /// `vertex_data`; indices are relative to `start_vertex`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_indexed_primitive(
        &mut self,
        primitive: PrimitiveType,
        start_vertex: u32,
        vertex_count: u32,
        primitive_count: u32,
        index_data: &[u16],
        vertex_data: &[u8],
        stride: u32,
    ) -> Result<(), ShimError> {
        if !self.accepts_stride(stride) {
            return Ok(());
        }
        self.flush_constants()?;

        if vertex_count > self.vertex_capacity {
            self.report_clamp(
                "vertices",
                "capacity",
                vertex_count as usize,
                self.vertex_capacity as usize,
            );
        }
        self.upload_vertices(vertex_data, stride, vertex_count.min(self.vertex_capacity))?;

        let translation = translate_primitive_topology(primitive);
        let wanted = primitive.verts_from_prim_count(primitive_count) as usize;
        let supplied = &index_data[..wanted.min(index_data.len())];
        if supplied.len() < wanted {
            self.report_clamp("indices", "short index data", wanted, supplied.len());
        }
        let index_count = if translation.needs_triangle_fan_emulation {
            let list = expand_triangle_fan_u16(supplied);
            self.upload_indices(PrimitiveType::TriangleList, &list)?
        } else {
            self.upload_indices(primitive, supplied)?
        };
        if index_count == 0 {
            debug!(%primitive, primitive_count, "no whole primitive to draw");
            return Ok(());
        }

        let base_vertex = i32::try_from(start_vertex).unwrap_or(i32::MAX);
        self.backend.set_vertex_buffer(&self.vertex_buffer, stride);
        self.backend.set_index_buffer(&self.index_buffer);
        self.backend.set_primitive_topology(translation.topology);
        self.backend.draw_indexed(index_count, 0, base_vertex);
        Ok(())
    }

    /// [`DeviceShim::draw_primitive`] over one of the fixed vertex structs. Also selects the
    /// matching input layout for the default vertex shader.
    pub fn draw_vertices<V: Vertex>(
        &mut self,
        primitive: PrimitiveType,
        count: u32,
        vertices: &[V],
    ) -> Result<(), ShimError> {
        self.set_vertex_format(V::FORMAT);
        self.draw_primitive(
            primitive,
            count,
            bytemuck::cast_slice(vertices),
            V::FORMAT.stride(),
        )
    }

    pub fn draw_indexed_vertices<V: Vertex>(
        &mut self,
        primitive: PrimitiveType,
        primitive_count: u32,
        indices: &[u16],
        vertices: &[V],
    ) -> Result<(), ShimError> {
        self.set_vertex_format(V::FORMAT);
        let vertex_count = u32::try_from(vertices.len()).unwrap_or(u32::MAX);
        self.draw_indexed_primitive(
            primitive,
            0,
            vertex_count,
            primitive_count,
            indices,
            bytemuck::cast_slice(vertices),
            V::FORMAT.stride(),
        )
    }

    /// Transform block first, then the vertex shader's constants, then the pixel shader's.
    fn flush_constants(&mut self) -> Result<(), ShimError> {
        if self.transform.is_dirty() {
            let block = *self.transform.block();
            self.backend
                .map_write_discard(&self.transform_buffer, &mut |mapped| {
                    let bytes = bytemuck::bytes_of(&block);
                    if let Some(dst) = mapped.get_mut(..bytes.len()) {
                        dst.copy_from_slice(bytes);
                    }
                })?;
            self.transform.mark_clean();
        }
        if let Some(table) = self.vertex_shader.as_ref().and_then(|vs| vs.constants()) {
            apply_table(table, &mut self.backend)?;
        }
        if let Some(table) = self.pixel_shader.as_ref().and_then(|ps| ps.constants()) {
            apply_table(table, &mut self.backend)?;
        }
        Ok(())
    }

    fn accepts_stride(&self, stride: u32) -> bool {
        if stride != 0 && stride <= MAX_VERTEX_STRIDE {
            return true;
        }
        if self.config.validation {
            warn!(stride, max = MAX_VERTEX_STRIDE, "unsupported vertex stride, draw skipped");
        } else {
            debug!(stride, max = MAX_VERTEX_STRIDE, "unsupported vertex stride, draw skipped");
        }
        false
    }

    /// Copies up to `limit` whole vertices into the vertex buffer; returns how many were copied.
    fn upload_vertices(&mut self, data: &[u8], stride: u32, limit: u32) -> Result<u32, ShimError> {
        let stride = stride as usize;
        let buffer_bytes = self.vertex_capacity as usize * MAX_VERTEX_STRIDE as usize;
        let fit = buffer_bytes.checked_div(stride).unwrap_or(0);
        let supplied = data.len().checked_div(stride).unwrap_or(0);
        let limit = limit as usize;
        let kept = limit.min(fit).min(supplied);
        if kept < limit {
            let reason = if supplied < limit { "short vertex data" } else { "capacity" };
            self.report_clamp("vertices", reason, limit, kept);
        }
        if kept == 0 {
            return Ok(0);
        }
        let data = &data[..kept * stride];
        self.backend
            .map_write_discard(&self.vertex_buffer, &mut |mapped| {
                if let Some(dst) = mapped.get_mut(..data.len()) {
                    dst.copy_from_slice(data);
                }
            })?;
        Ok(u32::try_from(kept).unwrap_or(u32::MAX))
    }

    /// Copies the indices of whole `primitive`s into the index buffer; returns how many were
    /// kept.
    fn upload_indices(
        &mut self,
        primitive: PrimitiveType,
        indices: &[u16],
    ) -> Result<u32, ShimError> {
        let fit = u32::try_from(indices.len())
            .unwrap_or(u32::MAX)
            .min(self.index_capacity);
        let primitives = primitive.prim_count_from_verts(fit);
        let kept = if primitives == 0 {
            0
        } else {
            primitive.verts_from_prim_count(primitives)
        };
        if (kept as usize) < indices.len() {
            let reason = if indices.len() > self.index_capacity as usize {
                "capacity"
            } else {
                "partial primitive"
            };
            self.report_clamp("indices", reason, indices.len(), kept as usize);
        }
        if kept == 0 {
            return Ok(0);
        }
        let bytes: &[u8] = bytemuck::cast_slice(&indices[..kept as usize]);
        self.backend
            .map_write_discard(&self.index_buffer, &mut |mapped| {
                if let Some(dst) = mapped.get_mut(..bytes.len()) {
                    dst.copy_from_slice(bytes);
                }
            })?;
        Ok(kept)
    }

    fn report_clamp(&self, what: &'static str, reason: &'static str, requested: usize, kept: usize) {
        if self.config.validation {
            warn!(what, reason, requested, kept, "geometry clamped");
        } else {
            debug!(what, reason, requested, kept, "geometry clamped");
        }
    }

    // -- Transforms and shaders --------------------------------------------------------------

    /// Stores the transpose of `matrix`; uploaded by the next draw.
    pub fn set_transform(&mut self, kind: TransformKind, matrix: &Matrix4) {
        self.transform.set(kind, matrix);
    }

    /// Selects a fallback pixel shader with the default vertex shader.
    pub fn set_shader(&mut self, shader: BuiltinShader) {
        self.builtin = shader;
        self.vertex_shader = None;
        self.pixel_shader = None;
        self.bind_default_vertex_shader();
        self.bind_fallback_pixel_shader();
    }

    /// Raw-index form of [`DeviceShim::set_shader`]; out-of-range indices are ignored.
    pub fn set_shader_index(&mut self, index: u32) {
        match BuiltinShader::from_index(index) {
            Some(shader) => self.set_shader(shader),
            None => debug!(index, "unknown builtin shader"),
        }
    }

    /// Binds `shader`, or the default vertex shader for `None`. Pending constant writes are
    /// applied and the constant buffers bound before the shader itself.
    pub fn set_vertex_shader(&mut self, shader: Option<&VertexShader<B>>) -> Result<(), ShimError> {
        let Some(shader) = shader else {
            self.vertex_shader = None;
            self.bind_default_vertex_shader();
            return Ok(());
        };
        if let Some(table) = shader.constants() {
            apply_table(table, &mut self.backend)?;
            bind_table(table, ShaderStage::Vertex, &mut self.backend)?;
        }
        self.backend
            .set_shader(ShaderStage::Vertex, Some(&shader.shader));
        self.backend.set_input_layout(Some(&shader.layout));
        self.vertex_shader = Some(shader.clone());
        Ok(())
    }

    /// Binds `shader`, or the current fallback pixel shader for `None`.
    pub fn set_pixel_shader(&mut self, shader: Option<&PixelShader<B>>) -> Result<(), ShimError> {
        let Some(shader) = shader else {
            self.pixel_shader = None;
            self.bind_fallback_pixel_shader();
            return Ok(());
        };
        if let Some(table) = shader.constants() {
            apply_table(table, &mut self.backend)?;
            bind_table(table, ShaderStage::Pixel, &mut self.backend)?;
        }
        self.backend
            .set_shader(ShaderStage::Pixel, Some(&shader.shader));
        self.pixel_shader = Some(shader.clone());
        Ok(())
    }

    /// Creates a vertex shader and its input layout for `format`.
    ///
    /// With `reflect`, the bytecode is reflected first; a reflection failure is reported as
    /// [`ShimError::Reflection`] and nothing is created.
    pub fn create_vertex_shader(
        &mut self,
        bytecode: &[u8],
        format: VertexFormat,
        reflect: bool,
    ) -> Result<VertexShader<B>, ShimError> {
        let constants = self.reflect(bytecode, reflect)?;
        let shader = self
            .backend
            .create_shader(ShaderStage::Vertex, bytecode)
            .map_err(ShimError::creation("vertex shader"))?;
        let layout = self
            .backend
            .create_input_layout(format.input_elements(), bytecode)
            .map_err(ShimError::creation("input layout"))?;
        debug!(?format, reflected = constants.is_some(), "created vertex shader");
        Ok(VertexShader {
            shader,
            layout,
            constants,
        })
    }

    pub fn create_pixel_shader(
        &mut self,
        bytecode: &[u8],
        reflect: bool,
    ) -> Result<PixelShader<B>, ShimError> {
        let constants = self.reflect(bytecode, reflect)?;
        let shader = self
            .backend
            .create_shader(ShaderStage::Pixel, bytecode)
            .map_err(ShimError::creation("pixel shader"))?;
        debug!(reflected = constants.is_some(), "created pixel shader");
        Ok(PixelShader { shader, constants })
    }

    fn reflect(
        &mut self,
        bytecode: &[u8],
        reflect: bool,
    ) -> Result<Option<SharedReflectionTable<B>>, ShimError> {
        if !reflect {
            return Ok(None);
        }
        let table = ShaderReflectionTable::reflect(&mut self.backend, bytecode)?;
        Ok(Some(table.into_shared()))
    }

    /// Selects the input layout used with the default vertex shader.
    pub fn set_vertex_format(&mut self, format: VertexFormat) {
        self.vertex_format = format;
        if self.vertex_shader.is_none() {
            self.backend
                .set_input_layout(Some(self.builtin_layouts.get(format)));
        }
    }

    fn bind_default_vertex_shader(&mut self) {
        self.backend
            .set_constant_buffers(ShaderStage::Vertex, TRANSFORM_SLOT, &[Some(&self.transform_buffer)]);
        self.backend
            .set_shader(ShaderStage::Vertex, Some(&self.builtin_vs));
        self.backend
            .set_input_layout(Some(self.builtin_layouts.get(self.vertex_format)));
    }

    fn bind_fallback_pixel_shader(&mut self) {
        self.backend
            .set_shader(ShaderStage::Pixel, Some(&self.builtin_ps[self.builtin.index()]));
    }

    // -- Textures and render targets ---------------------------------------------------------

    /// Binds a view of `texture` at pixel-shader `slot`, or clears the slot for `None`.
    pub fn set_texture(&mut self, slot: u32, texture: Option<&B::Texture>) -> Result<(), ShimError> {
        let Some(entry) = self.textures.get_mut(slot as usize) else {
            debug!(slot, "texture slot out of range");
            return Ok(());
        };
        let Some(texture) = texture else {
            self.backend
                .set_shader_resource(ShaderStage::Pixel, slot, None);
            *entry = None;
            return Ok(());
        };
        let dimension = match self.backend.texture_desc(texture).dimension {
            TextureDimension::D2 => ViewDimension::Texture2D,
            TextureDimension::D3 => ViewDimension::Texture3D,
        };
        let view = self
            .backend
            .create_shader_resource_view(texture, dimension)
            .map_err(ShimError::creation("shader resource view"))?;
        self.backend
            .set_shader_resource(ShaderStage::Pixel, slot, Some(&view));
        *entry = Some(view);
        Ok(())
    }

    /// Renders into `texture` with a full-surface viewport, or unbinds color output for `None`.
    pub fn set_render_target(
        &mut self,
        texture: Option<&B::Texture>,
        depth: DepthBinding<'_, B>,
    ) -> Result<(), ShimError> {
        let depth = match depth {
            DepthBinding::Keep => self.render_target.depth.clone(),
            DepthBinding::Use(view) => Some(view.clone()),
            DepthBinding::Detach => None,
        };
        let (color, viewport) = match texture {
            Some(texture) => {
                let desc = self.backend.texture_desc(texture);
                let view = self
                    .backend
                    .create_render_target_view(texture)
                    .map_err(ShimError::creation("render target view"))?;
                (Some(view), Viewport::full(desc.width, desc.height))
            }
            None => (None, self.render_target.viewport),
        };
        self.render_target = RenderTarget {
            color,
            depth,
            viewport,
        };
        self.bind_render_target();
        Ok(())
    }

    pub fn push_render_target(&mut self) {
        self.render_target_stack.push(self.render_target.clone());
    }

    /// Restores the last pushed target. Does nothing when the stack is empty.
    pub fn pop_render_target(&mut self) {
        if let Some(target) = self.render_target_stack.pop() {
            self.render_target = target;
            self.bind_render_target();
        }
    }

    fn bind_render_target(&mut self) {
        let target = &self.render_target;
        self.backend
            .set_render_target(target.color.as_ref(), target.depth.as_ref());
        if target.color.is_some() {
            self.backend.set_viewport(target.viewport);
        }
    }

    /// Clears the bound color target.
    pub fn clear(&mut self, rgba: [f32; 4]) {
        if let Some(color) = &self.render_target.color {
            self.backend.clear_render_target(color, rgba);
        }
    }

    pub fn create_texture(
        &mut self,
        desc: &TextureDesc,
        initial_data: Option<&[u8]>,
    ) -> Result<B::Texture, ShimError> {
        self.backend
            .create_texture(desc, initial_data)
            .map_err(ShimError::creation("texture"))
    }

    /// Creates a depth surface and returns its view.
    pub fn create_depth_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<B::DepthStencilView, ShimError> {
        let texture = self
            .backend
            .create_texture(
                &TextureDesc::d2(width, height, TextureFormat::Depth24Stencil8),
                None,
            )
            .map_err(ShimError::creation("depth texture"))?;
        self.backend
            .create_depth_stencil_view(&texture)
            .map_err(ShimError::creation("depth stencil view"))
    }

    // -- Fixed state -------------------------------------------------------------------------

    /// Unrecognized combinations are ignored and leave the previous state bound.
    pub fn set_blend_state(&mut self, enable: bool, src: u32, dst: u32) -> Result<(), ShimError> {
        let Some(desc) = translate_blend(enable, src, dst) else {
            self.report_ignored("blend", src, dst);
            return Ok(());
        };
        let state = self
            .states
            .blend(&mut self.backend, &desc)
            .map_err(ShimError::creation("blend state"))?;
        self.backend.set_blend_state(state);
        Ok(())
    }

    pub fn set_rasterizer_state(&mut self, cull: u32, fill: u32) -> Result<(), ShimError> {
        let Some(desc) = translate_rasterizer(cull, fill) else {
            self.report_ignored("rasterizer", cull, fill);
            return Ok(());
        };
        let state = self
            .states
            .rasterizer(&mut self.backend, &desc)
            .map_err(ShimError::creation("rasterizer state"))?;
        self.backend.set_rasterizer_state(state);
        Ok(())
    }

    pub fn set_sampler_state(
        &mut self,
        slot: u32,
        filter: u32,
        address: u32,
    ) -> Result<(), ShimError> {
        if slot >= MAX_TEXTURE_SLOTS {
            debug!(slot, "sampler slot out of range");
            return Ok(());
        }
        let Some(desc) = translate_sampler(filter, address) else {
            self.report_ignored("sampler", filter, address);
            return Ok(());
        };
        let state = self
            .states
            .sampler(&mut self.backend, &desc)
            .map_err(ShimError::creation("sampler state"))?;
        self.backend.set_sampler(ShaderStage::Pixel, slot, state);
        Ok(())
    }

    pub fn set_depth(&mut self, enabled: bool) -> Result<(), ShimError> {
        let state = self
            .states
            .depth(&mut self.backend, &depth_desc(enabled))
            .map_err(ShimError::creation("depth-stencil state"))?;
        self.backend.set_depth_stencil_state(state);
        Ok(())
    }

    fn report_ignored(&self, state: &'static str, first: u32, second: u32) {
        if self.config.validation {
            warn!(state, first, second, "unrecognized state combination ignored");
        } else {
            debug!(state, first, second, "unrecognized state combination ignored");
        }
    }
}

fn apply_table<B: GpuBackend>(
    table: &SharedReflectionTable<B>,
    backend: &mut B,
) -> Result<(), ShimError> {
    let mut table = table
        .try_borrow_mut()
        .map_err(|_| BackendError::InvalidState("reflection table is borrowed"))?;
    table.apply_changes(backend)?;
    Ok(())
}

fn bind_table<B: GpuBackend>(
    table: &SharedReflectionTable<B>,
    stage: ShaderStage,
    backend: &mut B,
) -> Result<(), ShimError> {
    let table = table
        .try_borrow()
        .map_err(|_| BackendError::InvalidState("reflection table is borrowed"))?;
    let (slots, count) = table.constant_buffer_slots();
    if count > 0 {
        backend.set_constant_buffers(stage, 0, &slots[..count]);
    }
    Ok(())
}
