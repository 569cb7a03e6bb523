mod common;

use d3dshim_device::backend::{
    ObjectKind, ShaderStage, SoftCommand, TextureDesc, TextureDimension, TextureFormat, Viewport,
};
use d3dshim_device::{DepthBinding, ShimConfig, ShimError};
use pretty_assertions::assert_eq;

#[test]
fn textures_bind_with_matching_view_dimension() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let flat = shim.create_texture(&TextureDesc::d2(4, 4, TextureFormat::Rgba8Unorm), None)?;
    let volume = shim.create_texture(
        &TextureDesc::volume(4, 4, 4, TextureFormat::Rgba8Unorm),
        Some(&[0u8; 4 * 4 * 4 * 4]),
    )?;

    shim.set_texture(0, Some(&flat))?;
    shim.set_texture(1, Some(&volume))?;

    let commands = shim.backend_mut().take_commands();
    assert_eq!(commands.len(), 2);
    for (slot, command) in commands.iter().enumerate() {
        assert!(matches!(
            command,
            SoftCommand::SetShaderResource { stage: ShaderStage::Pixel, slot: s, view: Some(_) }
                if *s == slot as u32
        ));
    }
    assert_eq!(shim.backend().created(ObjectKind::ShaderResourceView), 2);
    assert_eq!(volume.info().dimension, TextureDimension::D3);
    Ok(())
}

#[test]
fn replacing_and_clearing_a_slot_releases_the_old_view() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let live = shim.backend().live_objects();
    let first = shim.create_texture(&TextureDesc::d2(2, 2, TextureFormat::Rgba8Unorm), None)?;
    let second = shim.create_texture(&TextureDesc::d2(2, 2, TextureFormat::Rgba8Unorm), None)?;

    shim.set_texture(0, Some(&first))?;
    let bound = live.count();
    shim.set_texture(0, Some(&second))?;
    assert_eq!(live.count(), bound);

    shim.set_texture(0, None)?;
    assert_eq!(live.count(), bound - 1);
    assert_eq!(
        shim.backend().commands().last(),
        Some(&SoftCommand::SetShaderResource {
            stage: ShaderStage::Pixel,
            slot: 0,
            view: None,
        })
    );
    Ok(())
}

#[test]
fn out_of_range_texture_slot_is_ignored() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let texture = shim.create_texture(&TextureDesc::d2(2, 2, TextureFormat::Rgba8Unorm), None)?;

    shim.set_texture(16, Some(&texture))?;

    assert!(shim.backend().commands().is_empty());
    assert_eq!(shim.backend().created(ObjectKind::ShaderResourceView), 0);
    Ok(())
}

#[test]
fn render_target_sets_full_viewport_and_depth() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let target = shim.create_texture(&TextureDesc::render_target(640, 480), None)?;
    let depth = shim.create_depth_target(640, 480)?;

    shim.set_render_target(Some(&target), DepthBinding::Use(&depth))?;

    let commands = shim.backend_mut().take_commands();
    let [SoftCommand::SetRenderTarget { color: Some(_), depth: Some(depth_id) }, SoftCommand::SetViewport(viewport)] =
        commands.as_slice()
    else {
        panic!("unexpected commands {commands:?}");
    };
    assert_eq!(*depth_id, depth.id());
    assert_eq!(*viewport, Viewport::full(640, 480));

    // Unbinding color keeps depth and emits no viewport.
    shim.set_render_target(None, DepthBinding::Keep)?;
    assert_eq!(
        shim.backend_mut().take_commands(),
        vec![SoftCommand::SetRenderTarget {
            color: None,
            depth: Some(depth.id()),
        }]
    );

    shim.set_render_target(None, DepthBinding::Detach)?;
    assert_eq!(
        shim.backend_mut().take_commands(),
        vec![SoftCommand::SetRenderTarget {
            color: None,
            depth: None,
        }]
    );
    Ok(())
}

#[test]
fn push_and_pop_restore_target_and_viewport() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let screen = shim.create_texture(&TextureDesc::render_target(800, 600), None)?;
    let offscreen = shim.create_texture(&TextureDesc::render_target(128, 128), None)?;

    shim.set_render_target(Some(&screen), DepthBinding::Detach)?;
    let screen_binding = shim.backend_mut().take_commands();

    shim.push_render_target();
    assert_eq!(shim.render_target_stack_depth(), 1);
    shim.set_render_target(Some(&offscreen), DepthBinding::Keep)?;
    assert!(shim
        .backend()
        .commands()
        .contains(&SoftCommand::SetViewport(Viewport::full(128, 128))));
    shim.backend_mut().take_commands();

    shim.pop_render_target();
    assert_eq!(shim.render_target_stack_depth(), 0);
    assert_eq!(shim.backend_mut().take_commands(), screen_binding);

    shim.pop_render_target();
    assert!(shim.backend().commands().is_empty());
    Ok(())
}

#[test]
fn clear_needs_a_color_target() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    shim.clear([0.0, 0.0, 0.0, 1.0]);
    assert!(shim.backend().commands().is_empty());

    let target = shim.create_texture(&TextureDesc::render_target(16, 16), None)?;
    shim.set_render_target(Some(&target), DepthBinding::Keep)?;
    shim.clear([0.25, 0.5, 0.75, 1.0]);
    assert!(matches!(
        shim.backend().commands().last(),
        Some(SoftCommand::Clear { rgba, .. }) if *rgba == [0.25, 0.5, 0.75, 1.0]
    ));
    Ok(())
}

#[test]
fn invalid_targets_fail_creation() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let plain = shim.create_texture(&TextureDesc::d2(16, 16, TextureFormat::Rgba8Unorm), None)?;

    let err = shim
        .set_render_target(Some(&plain), DepthBinding::Keep)
        .err()
        .unwrap();
    assert!(matches!(err, ShimError::ResourceCreation { what: "render target view", .. }));

    let err = shim
        .create_texture(&TextureDesc::d2(0, 16, TextureFormat::Rgba8Unorm), None)
        .err()
        .unwrap();
    assert!(matches!(err, ShimError::ResourceCreation { what: "texture", .. }));
    Ok(())
}

#[test]
fn teardown_releases_every_object() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let live = shim.backend().live_objects();
    {
        let target = shim.create_texture(&TextureDesc::render_target(32, 32), None)?;
        let depth = shim.create_depth_target(32, 32)?;
        shim.set_render_target(Some(&target), DepthBinding::Use(&depth))?;
        shim.push_render_target();
        shim.set_texture(2, Some(&target))?;
        shim.set_blend_state(true, 5, 6)?;
        shim.set_depth(true)?;
    }
    assert!(live.count() > 0);

    drop(shim);
    assert_eq!(live.count(), 0);
    Ok(())
}

#[test]
fn initialization_failure_names_the_resource() {
    let mut backend = d3dshim_device::backend::SoftGpuBackend::new();
    let live = backend.live_objects();
    backend.fail_next_creations(1);
    let vs = d3dshim_dxbc::test_utils::shader_container(1, None);
    let ps = d3dshim_dxbc::test_utils::shader_container(0, None);
    let shaders = d3dshim_device::BuiltinShaderBytecode {
        transform_vs: &vs,
        diffuse_ps: &ps,
        textured_ps: &ps,
        flat_ps: &ps,
        dual_textured_ps: &ps,
    };

    let err = d3dshim_device::DeviceShim::new(backend, ShimConfig::default(), &shaders)
        .err()
        .unwrap();

    assert!(matches!(err, ShimError::ResourceCreation { what: "vertex buffer", .. }));
    assert_eq!(live.count(), 0);
}
