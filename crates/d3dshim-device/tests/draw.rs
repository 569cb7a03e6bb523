mod common;

use d3dshim_device::backend::{SoftCommand, Topology};
use d3dshim_device::transform::transpose;
use d3dshim_device::{ColorVertex, Matrix4, PrimitiveType, TexturedVertex, TransformKind};
use pretty_assertions::assert_eq;

fn color_vertices(n: u32) -> Vec<ColorVertex> {
    (0..n)
        .map(|i| ColorVertex {
            position: [i as f32, 2.0 * i as f32, 0.5],
            color: 0xFF00_0000 | i,
        })
        .collect()
}

#[test]
fn triangle_fan_draws_through_shared_index_buffer() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let vertices = color_vertices(10);
    let bytes: &[u8] = bytemuck::cast_slice(&vertices);

    shim.draw_primitive(PrimitiveType::TriangleFan, 8, bytes, 16)?;

    let vb = shim.vertex_buffer().id();
    let fan = shim.fan_index_buffer().id();
    assert_eq!(
        shim.backend_mut().take_commands(),
        vec![
            SoftCommand::Map { buffer: vb },
            SoftCommand::SetVertexBuffer { buffer: vb, stride: 16 },
            SoftCommand::SetIndexBuffer { buffer: fan },
            SoftCommand::SetTopology(Topology::TriangleList),
            SoftCommand::DrawIndexed {
                index_count: 24,
                start_index: 0,
                base_vertex: 0,
            },
        ]
    );

    let uploaded = shim.backend().buffer_contents(vb).unwrap();
    assert_eq!(&uploaded[..bytes.len()], bytes);
    Ok(())
}

#[test]
fn fan_buffer_holds_the_reference_triangulation() -> anyhow::Result<()> {
    let shim = common::shim(3072)?;
    let fan = shim.backend().buffer_contents(shim.fan_index_buffer().id()).unwrap();
    let indices: Vec<u16> = fan
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();

    assert_eq!(shim.fan_vertex_capacity(), 512);
    assert_eq!(indices.len(), 3 * 510);
    for (t, triangle) in indices.chunks_exact(3).enumerate() {
        let i = t as u16 + 1;
        assert_eq!(triangle, &[0, i, i + 1]);
    }
    Ok(())
}

#[test]
fn direct_topologies_draw_unindexed() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let vertices = color_vertices(8);
    let bytes: &[u8] = bytemuck::cast_slice(&vertices);

    let cases = [
        (PrimitiveType::PointList, 8, Topology::PointList, 8),
        (PrimitiveType::LineList, 4, Topology::LineList, 8),
        (PrimitiveType::LineStrip, 7, Topology::LineStrip, 8),
        (PrimitiveType::TriangleList, 2, Topology::TriangleList, 6),
        (PrimitiveType::TriangleStrip, 6, Topology::TriangleStrip, 8),
    ];
    for (primitive, count, topology, vertex_count) in cases {
        shim.draw_primitive(primitive, count, bytes, 16)?;
        let commands = shim.backend_mut().take_commands();
        assert_eq!(
            &commands[commands.len() - 2..],
            &[
                SoftCommand::SetTopology(topology),
                SoftCommand::Draw {
                    vertex_count,
                    start_vertex: 0,
                },
            ],
            "{primitive}"
        );
    }
    Ok(())
}

#[test]
fn oversized_vertex_upload_is_clamped_to_capacity() -> anyhow::Result<()> {
    let mut shim = common::shim(18)?;
    let vb = shim.vertex_buffer().id();
    let buffer_bytes = 18 * 32;
    let data: Vec<u8> = (0..100 * 32).map(|i| (i % 251) as u8).collect();

    for stride in [16u32, 24, 32] {
        shim.backend_mut().take_commands();
        shim.draw_primitive(PrimitiveType::PointList, 100, &data, stride)?;

        let Some(&SoftCommand::Draw { vertex_count, .. }) = shim.backend().commands().last() else {
            panic!("no draw for stride {stride}");
        };
        assert_eq!(vertex_count, 18, "stride {stride}");
        assert!((vertex_count * stride) as usize <= buffer_bytes);

        let contents = shim.backend().buffer_contents(vb).unwrap();
        assert_eq!(contents.len(), buffer_bytes);
        let uploaded = (vertex_count * stride) as usize;
        assert_eq!(&contents[..uploaded], &data[..uploaded]);
    }
    Ok(())
}

#[test]
fn unsupported_strides_skip_the_draw() -> anyhow::Result<()> {
    let mut shim = common::shim(18)?;
    let data = vec![1u8; 100 * 64];

    shim.draw_primitive(PrimitiveType::PointList, 100, &data, 64)?;
    shim.draw_primitive(PrimitiveType::PointList, 100, &data, 0)?;
    shim.draw_indexed_primitive(PrimitiveType::TriangleList, 0, 3, 1, &[0, 1, 2], &data, 33)?;

    assert!(shim.backend().commands().is_empty());
    Ok(())
}

#[test]
fn short_vertex_data_limits_the_draw() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let vertices = color_vertices(3);
    let bytes: &[u8] = bytemuck::cast_slice(&vertices);

    shim.draw_primitive(PrimitiveType::TriangleList, 10, bytes, 16)?;
    assert_eq!(
        shim.backend().commands().last(),
        Some(&SoftCommand::Draw {
            vertex_count: 3,
            start_vertex: 0,
        })
    );

    // A trailing partial vertex and a partial primitive are both dropped.
    let vertices = color_vertices(5);
    let bytes: &[u8] = bytemuck::cast_slice(&vertices);
    shim.draw_primitive(PrimitiveType::TriangleList, 4, &bytes[..5 * 16 - 4], 16)?;
    assert_eq!(
        shim.backend().commands().last(),
        Some(&SoftCommand::Draw {
            vertex_count: 3,
            start_vertex: 0,
        })
    );

    // Fans draw the triangles their uploaded vertices form.
    shim.draw_primitive(PrimitiveType::TriangleFan, 8, bytes, 16)?;
    assert!(matches!(
        shim.backend().commands().last(),
        Some(SoftCommand::DrawIndexed { index_count: 9, .. })
    ));

    // Nothing left to draw: no bind, no draw.
    shim.backend_mut().take_commands();
    shim.draw_primitive(PrimitiveType::TriangleList, 1, &bytes[..32], 16)?;
    assert!(!shim
        .backend()
        .commands()
        .iter()
        .any(|c| matches!(c, SoftCommand::Draw { .. } | SoftCommand::SetTopology(_))));
    Ok(())
}

#[test]
fn oversized_fan_is_clamped_to_fan_capacity() -> anyhow::Result<()> {
    let mut shim = common::shim(18)?;
    let vertices = color_vertices(7);

    shim.draw_primitive(PrimitiveType::TriangleFan, 5, bytemuck::cast_slice(&vertices), 16)?;

    assert_eq!(shim.fan_vertex_capacity(), 3);
    assert_eq!(
        shim.backend().commands().last(),
        Some(&SoftCommand::DrawIndexed {
            index_count: 3,
            start_index: 0,
            base_vertex: 0,
        })
    );
    Ok(())
}

#[test]
fn indexed_draw_uploads_both_buffers() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let vertices = color_vertices(4);
    let indices = [0u16, 1, 2, 0, 2, 3];

    shim.draw_indexed_primitive(
        PrimitiveType::TriangleList,
        0,
        4,
        2,
        &indices,
        bytemuck::cast_slice(&vertices),
        16,
    )?;

    let vb = shim.vertex_buffer().id();
    let ib = shim.index_buffer().id();
    assert_eq!(
        shim.backend_mut().take_commands(),
        vec![
            SoftCommand::Map { buffer: vb },
            SoftCommand::Map { buffer: ib },
            SoftCommand::SetVertexBuffer { buffer: vb, stride: 16 },
            SoftCommand::SetIndexBuffer { buffer: ib },
            SoftCommand::SetTopology(Topology::TriangleList),
            SoftCommand::DrawIndexed {
                index_count: 6,
                start_index: 0,
                base_vertex: 0,
            },
        ]
    );
    let index_bytes = shim.backend().buffer_contents(ib).unwrap();
    assert_eq!(&index_bytes[..12], bytemuck::cast_slice::<u16, u8>(&indices));
    Ok(())
}

#[test]
fn indexed_fans_are_expanded_to_lists() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let vertices = color_vertices(9);

    shim.draw_indexed_primitive(
        PrimitiveType::TriangleFan,
        0,
        9,
        2,
        &[5, 6, 7, 8],
        bytemuck::cast_slice(&vertices),
        16,
    )?;

    let ib = shim.index_buffer().id();
    let index_bytes = shim.backend().buffer_contents(ib).unwrap();
    assert_eq!(
        &index_bytes[..12],
        bytemuck::cast_slice::<u16, u8>(&[5, 6, 7, 5, 7, 8])
    );
    assert!(matches!(
        shim.backend().commands().last(),
        Some(SoftCommand::DrawIndexed { index_count: 6, .. })
    ));
    Ok(())
}

#[test]
fn index_upload_is_clamped_to_capacity() -> anyhow::Result<()> {
    let mut shim = common::shim(18)?;
    let vertices = color_vertices(4);

    shim.draw_indexed_primitive(
        PrimitiveType::TriangleList,
        0,
        4,
        2,
        &[0, 1, 2, 0, 2, 3],
        bytemuck::cast_slice(&vertices),
        16,
    )?;

    assert_eq!(shim.index_capacity(), 3);
    assert!(matches!(
        shim.backend().commands().last(),
        Some(SoftCommand::DrawIndexed { index_count: 3, .. })
    ));
    Ok(())
}

#[test]
fn index_clamp_keeps_whole_primitives() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    assert_eq!(shim.index_capacity(), 512);
    let vertices = color_vertices(3);
    let indices: Vec<u16> = (0..600).map(|i| (i % 3) as u16).collect();

    shim.draw_indexed_primitive(
        PrimitiveType::TriangleList,
        0,
        3,
        200,
        &indices,
        bytemuck::cast_slice(&vertices),
        16,
    )?;
    assert!(matches!(
        shim.backend().commands().last(),
        Some(SoftCommand::DrawIndexed { index_count: 510, .. })
    ));

    shim.draw_indexed_primitive(
        PrimitiveType::LineList,
        0,
        3,
        300,
        &indices,
        bytemuck::cast_slice(&vertices),
        16,
    )?;
    assert!(matches!(
        shim.backend().commands().last(),
        Some(SoftCommand::DrawIndexed { index_count: 512, .. })
    ));

    // Short index data: five indices hold one whole triangle.
    shim.draw_indexed_primitive(
        PrimitiveType::TriangleList,
        0,
        3,
        4,
        &indices[..5],
        bytemuck::cast_slice(&vertices),
        16,
    )?;
    assert!(matches!(
        shim.backend().commands().last(),
        Some(SoftCommand::DrawIndexed { index_count: 3, .. })
    ));
    Ok(())
}

#[test]
fn typed_draw_derives_stride() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let vertices = vec![TexturedVertex::default(); 3];

    shim.draw_vertices(PrimitiveType::TriangleList, 1, &vertices)?;

    let vb = shim.vertex_buffer().id();
    let commands = shim.backend_mut().take_commands();
    assert!(matches!(commands[0], SoftCommand::SetInputLayout { layout: Some(_) }));
    assert!(commands.contains(&SoftCommand::SetVertexBuffer { buffer: vb, stride: 24 }));
    Ok(())
}

#[test]
fn last_transform_write_wins_with_a_single_upload() -> anyhow::Result<()> {
    let mut shim = common::shim(3072)?;
    let tb = shim.transform_buffer().id();
    let first: Matrix4 = [[2.0; 4]; 4];
    let mut second: Matrix4 = [[0.0; 4]; 4];
    for (r, row) in second.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = (r * 4 + c) as f32;
        }
    }

    shim.set_transform(TransformKind::View, &first);
    shim.set_transform(TransformKind::View, &second);
    assert_eq!(shim.backend().map_count(tb), 0);

    let vertices = color_vertices(3);
    shim.draw_vertices(PrimitiveType::TriangleList, 1, &vertices)?;
    shim.draw_vertices(PrimitiveType::TriangleList, 1, &vertices)?;
    assert_eq!(shim.backend().map_count(tb), 1);

    let block = shim.backend().buffer_contents(tb).unwrap();
    let view = common::floats(&block[64..128]);
    let expected: Vec<f32> = transpose(&second).iter().flatten().copied().collect();
    assert_eq!(view, expected);
    // World is still identity.
    assert_eq!(common::floats(&block[0..16]), vec![1.0, 0.0, 0.0, 0.0]);
    Ok(())
}
