#![allow(dead_code)]

use d3dshim_device::backend::SoftGpuBackend;
use d3dshim_device::{BuiltinShaderBytecode, DeviceShim, ShimConfig};
use d3dshim_dxbc::test_utils::shader_container;
use tracing_subscriber::filter::LevelFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn shim_with(config: ShimConfig) -> anyhow::Result<DeviceShim<SoftGpuBackend>> {
    init_tracing();
    let vs = shader_container(1, None);
    let ps = shader_container(0, None);
    let shaders = BuiltinShaderBytecode {
        transform_vs: &vs,
        diffuse_ps: &ps,
        textured_ps: &ps,
        flat_ps: &ps,
        dual_textured_ps: &ps,
    };
    Ok(DeviceShim::new(SoftGpuBackend::new(), config, &shaders)?)
}

/// A shim with the given vertex capacity and no commands recorded yet.
pub fn shim(vertex_capacity: u32) -> anyhow::Result<DeviceShim<SoftGpuBackend>> {
    let mut shim = shim_with(ShimConfig {
        vertex_capacity,
        ..ShimConfig::default()
    })?;
    shim.backend_mut().take_commands();
    Ok(shim)
}

pub fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
