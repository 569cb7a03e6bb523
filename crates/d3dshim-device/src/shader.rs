use crate::backend::GpuBackend;
use crate::reflection::SharedReflectionTable;

/// A vertex shader plus the input layout it was created with.
pub struct VertexShader<B: GpuBackend> {
    pub(crate) shader: B::Shader,
    pub(crate) layout: B::InputLayout,
    pub(crate) constants: Option<SharedReflectionTable<B>>,
}

impl<B: GpuBackend> VertexShader<B> {
    pub fn shader(&self) -> &B::Shader {
        &self.shader
    }

    pub fn layout(&self) -> &B::InputLayout {
        &self.layout
    }

    /// Present when the shader was created with reflection.
    pub fn constants(&self) -> Option<&SharedReflectionTable<B>> {
        self.constants.as_ref()
    }
}

impl<B: GpuBackend> Clone for VertexShader<B> {
    fn clone(&self) -> Self {
        Self {
            shader: self.shader.clone(),
            layout: self.layout.clone(),
            constants: self.constants.clone(),
        }
    }
}

pub struct PixelShader<B: GpuBackend> {
    pub(crate) shader: B::Shader,
    pub(crate) constants: Option<SharedReflectionTable<B>>,
}

impl<B: GpuBackend> PixelShader<B> {
    pub fn shader(&self) -> &B::Shader {
        &self.shader
    }

    pub fn constants(&self) -> Option<&SharedReflectionTable<B>> {
        self.constants.as_ref()
    }
}

impl<B: GpuBackend> Clone for PixelShader<B> {
    fn clone(&self) -> Self {
        Self {
            shader: self.shader.clone(),
            constants: self.constants.clone(),
        }
    }
}

/// Fallback pixel shaders, always paired with the default transform vertex shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinShader {
    Diffuse,
    Textured,
    Flat,
    DualTextured,
}

impl BuiltinShader {
    pub const ALL: [BuiltinShader; 4] = [
        Self::Diffuse,
        Self::Textured,
        Self::Flat,
        Self::DualTextured,
    ];

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(usize::try_from(index).ok()?).copied()
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Diffuse => 0,
            Self::Textured => 1,
            Self::Flat => 2,
            Self::DualTextured => 3,
        }
    }
}

/// Precompiled bytecode of the fallback shaders, loaded once at initialization.
#[derive(Clone, Copy, Debug)]
pub struct BuiltinShaderBytecode<'a> {
    /// Reads world/view/projection from constant buffer slot 0.
    pub transform_vs: &'a [u8],
    pub diffuse_ps: &'a [u8],
    pub textured_ps: &'a [u8],
    pub flat_ps: &'a [u8],
    pub dual_textured_ps: &'a [u8],
}

impl<'a> BuiltinShaderBytecode<'a> {
    pub fn pixel(&self, shader: BuiltinShader) -> &'a [u8] {
        match shader {
            BuiltinShader::Diffuse => self.diffuse_ps,
            BuiltinShader::Textured => self.textured_ps,
            BuiltinShader::Flat => self.flat_ps,
            BuiltinShader::DualTextured => self.dual_textured_ps,
        }
    }
}
