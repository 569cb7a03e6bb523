mod common;

use d3dshim_device::backend::{ObjectKind, ShaderStage, SoftCommand};
use d3dshim_device::d3d9;
use pretty_assertions::assert_eq;

#[test]
fn blend_states_are_created_once_per_combination() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;

    for _ in 0..3 {
        shim.set_blend_state(true, d3d9::D3DBLEND_SRCALPHA, d3d9::D3DBLEND_INVSRCALPHA)?;
    }
    shim.set_blend_state(false, d3d9::D3DBLEND_ONE, d3d9::D3DBLEND_ZERO)?;

    assert_eq!(shim.backend().created(ObjectKind::BlendState), 2);
    assert_eq!(shim.state_cache().len(), 2);
    let binds = shim
        .backend()
        .commands()
        .iter()
        .filter(|c| matches!(c, SoftCommand::SetBlendState(_)))
        .count();
    assert_eq!(binds, 4);
    Ok(())
}

#[test]
fn unrecognized_combinations_keep_the_previous_state() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;

    shim.set_blend_state(true, 0, d3d9::D3DBLEND_ONE)?;
    shim.set_rasterizer_state(d3d9::D3DCULL_NONE, 1)?;
    shim.set_sampler_state(0, 7, d3d9::D3DTADDRESS_WRAP)?;

    assert!(shim.backend().commands().is_empty());
    assert!(shim.state_cache().is_empty());
    Ok(())
}

#[test]
fn rasterizer_cull_modes_follow_winding() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;

    shim.set_rasterizer_state(d3d9::D3DCULL_CW, d3d9::D3DFILL_SOLID)?;
    shim.set_rasterizer_state(d3d9::D3DCULL_CCW, d3d9::D3DFILL_WIREFRAME)?;
    shim.set_rasterizer_state(d3d9::D3DCULL_CW, d3d9::D3DFILL_SOLID)?;

    assert_eq!(shim.backend().created(ObjectKind::RasterizerState), 2);
    let ids: Vec<u32> = shim
        .backend()
        .commands()
        .iter()
        .filter_map(|c| match c {
            SoftCommand::SetRasterizerState(id) => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(ids.len(), 3);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(ids[0], ids[2]);
    Ok(())
}

#[test]
fn samplers_bind_to_pixel_slots() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;

    shim.set_sampler_state(3, d3d9::D3DTEXF_LINEAR, d3d9::D3DTADDRESS_CLAMP)?;
    shim.set_sampler_state(5, d3d9::D3DTEXF_LINEAR, d3d9::D3DTADDRESS_CLAMP)?;
    shim.set_sampler_state(16, d3d9::D3DTEXF_POINT, d3d9::D3DTADDRESS_WRAP)?;

    let commands = shim.backend_mut().take_commands();
    assert_eq!(commands.len(), 2);
    let SoftCommand::SetSampler { stage, slot, sampler } = commands[0] else {
        panic!("unexpected command {:?}", commands[0]);
    };
    assert_eq!((stage, slot), (ShaderStage::Pixel, 3));
    assert_eq!(
        commands[1],
        SoftCommand::SetSampler {
            stage: ShaderStage::Pixel,
            slot: 5,
            sampler,
        }
    );
    assert_eq!(shim.backend().created(ObjectKind::SamplerState), 1);
    Ok(())
}

#[test]
fn depth_toggle_uses_two_cached_states() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;

    shim.set_depth(true)?;
    shim.set_depth(false)?;
    shim.set_depth(true)?;

    assert_eq!(shim.backend().created(ObjectKind::DepthStencilState), 2);
    let commands = shim.backend().commands();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[0], commands[2]);
    assert_ne!(commands[0], commands[1]);
    Ok(())
}

#[test]
fn state_creation_failure_is_reported() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    shim.backend_mut().fail_next_creations(1);

    let err = shim.set_depth(true).err().unwrap();
    assert!(err.to_string().contains("depth-stencil state"), "{err}");
    assert!(shim.state_cache().is_empty());

    shim.set_depth(true)?;
    assert_eq!(shim.state_cache().len(), 1);
    Ok(())
}
