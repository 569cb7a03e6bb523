//! Translation of the recognized legacy state combinations into immutable state objects, and
//! the cache that creates each object once.

use std::fmt::Debug;
use std::hash::Hash;

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use tracing::debug;

use crate::backend::{
    AddressMode, BackendError, BlendDesc, BlendFactor, CullMode, DepthStencilDesc, FillMode,
    FilterMode, GpuBackend, RasterizerDesc, SamplerDesc,
};
use crate::d3d9;

/// Adjustment from a color blend factor to the factor used for the alpha channel, indexed by
/// the raw legacy value.
const ALPHA_FACTOR_ADJUST: [i32; 11] = [0, 0, 0, 2, 2, 0, 0, 0, 0, -2, -2];

pub fn blend_factor(raw: u32) -> Option<BlendFactor> {
    BlendFactor::from_raw(raw)
}

/// Alpha-channel counterpart of a raw color blend factor.
pub fn alpha_blend_factor(raw: u32) -> Option<BlendFactor> {
    let adjust = *ALPHA_FACTOR_ADJUST.get(usize::try_from(raw).ok()?)?;
    let adjusted = u32::try_from(i64::from(raw) + i64::from(adjust)).ok()?;
    BlendFactor::from_raw(adjusted)
}

/// `None` when the combination is outside the recognized set.
pub fn translate_blend(enable: bool, src: u32, dst: u32) -> Option<BlendDesc> {
    if !enable {
        return Some(BlendDesc {
            enable: false,
            src: BlendFactor::One,
            dst: BlendFactor::Zero,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
        });
    }
    Some(BlendDesc {
        enable: true,
        src: blend_factor(src)?,
        dst: blend_factor(dst)?,
        src_alpha: alpha_blend_factor(src)?,
        dst_alpha: alpha_blend_factor(dst)?,
    })
}

pub fn translate_rasterizer(cull: u32, fill: u32) -> Option<RasterizerDesc> {
    // Legacy front faces wind clockwise.
    let cull = match cull {
        d3d9::D3DCULL_NONE => CullMode::None,
        d3d9::D3DCULL_CW => CullMode::Front,
        d3d9::D3DCULL_CCW => CullMode::Back,
        _ => return None,
    };
    let fill = match fill {
        d3d9::D3DFILL_WIREFRAME => FillMode::Wireframe,
        d3d9::D3DFILL_SOLID => FillMode::Solid,
        _ => return None,
    };
    Some(RasterizerDesc { cull, fill })
}

pub fn translate_sampler(filter: u32, address: u32) -> Option<SamplerDesc> {
    let filter = match filter {
        d3d9::D3DTEXF_POINT => FilterMode::Point,
        d3d9::D3DTEXF_LINEAR => FilterMode::Linear,
        _ => return None,
    };
    let address = match address {
        d3d9::D3DTADDRESS_WRAP => AddressMode::Wrap,
        d3d9::D3DTADDRESS_MIRROR => AddressMode::Mirror,
        d3d9::D3DTADDRESS_CLAMP => AddressMode::Clamp,
        _ => return None,
    };
    Some(SamplerDesc { filter, address })
}

pub fn depth_desc(enabled: bool) -> DepthStencilDesc {
    DepthStencilDesc {
        depth_enable: enabled,
        depth_write: enabled,
    }
}

/// Lazily created state objects, keyed by their description.
pub struct StateCache<B: GpuBackend> {
    blend: HashMap<BlendDesc, B::BlendState>,
    rasterizer: HashMap<RasterizerDesc, B::RasterizerState>,
    sampler: HashMap<SamplerDesc, B::SamplerState>,
    depth: HashMap<DepthStencilDesc, B::DepthStencilState>,
}

impl<B: GpuBackend> Default for StateCache<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: GpuBackend> StateCache<B> {
    pub fn new() -> Self {
        Self {
            blend: HashMap::new(),
            rasterizer: HashMap::new(),
            sampler: HashMap::new(),
            depth: HashMap::new(),
        }
    }

    pub fn blend(&mut self, backend: &mut B, desc: &BlendDesc) -> Result<&B::BlendState, BackendError> {
        get_or_create(&mut self.blend, *desc, "blend", |d| backend.create_blend_state(d))
    }

    pub fn rasterizer(
        &mut self,
        backend: &mut B,
        desc: &RasterizerDesc,
    ) -> Result<&B::RasterizerState, BackendError> {
        get_or_create(&mut self.rasterizer, *desc, "rasterizer", |d| {
            backend.create_rasterizer_state(d)
        })
    }

    pub fn sampler(
        &mut self,
        backend: &mut B,
        desc: &SamplerDesc,
    ) -> Result<&B::SamplerState, BackendError> {
        get_or_create(&mut self.sampler, *desc, "sampler", |d| {
            backend.create_sampler_state(d)
        })
    }

    pub fn depth(
        &mut self,
        backend: &mut B,
        desc: &DepthStencilDesc,
    ) -> Result<&B::DepthStencilState, BackendError> {
        get_or_create(&mut self.depth, *desc, "depth-stencil", |d| {
            backend.create_depth_stencil_state(d)
        })
    }

    /// Total number of cached objects.
    pub fn len(&self) -> usize {
        self.blend.len() + self.rasterizer.len() + self.sampler.len() + self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn get_or_create<'a, K, V>(
    map: &'a mut HashMap<K, V>,
    key: K,
    kind: &'static str,
    create: impl FnOnce(&K) -> Result<V, BackendError>,
) -> Result<&'a V, BackendError>
where
    K: Copy + Eq + Hash + Debug,
{
    match map.entry(key) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => {
            let state = create(&key)?;
            debug!(kind, ?key, "created state object");
            Ok(entry.insert(state))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ObjectKind, SoftGpuBackend};
    use pretty_assertions::assert_eq;

    #[test]
    fn alpha_factors_follow_literal_table() {
        let expected = [
            (d3d9::D3DBLEND_ZERO, BlendFactor::Zero),
            (d3d9::D3DBLEND_ONE, BlendFactor::One),
            (d3d9::D3DBLEND_SRCCOLOR, BlendFactor::SrcAlpha),
            (d3d9::D3DBLEND_INVSRCCOLOR, BlendFactor::InvSrcAlpha),
            (d3d9::D3DBLEND_SRCALPHA, BlendFactor::SrcAlpha),
            (d3d9::D3DBLEND_INVSRCALPHA, BlendFactor::InvSrcAlpha),
            (d3d9::D3DBLEND_DESTALPHA, BlendFactor::DestAlpha),
            (d3d9::D3DBLEND_INVDESTALPHA, BlendFactor::InvDestAlpha),
            (d3d9::D3DBLEND_DESTCOLOR, BlendFactor::DestAlpha),
            (d3d9::D3DBLEND_INVDESTCOLOR, BlendFactor::InvDestAlpha),
        ];
        for (raw, factor) in expected {
            assert_eq!(alpha_blend_factor(raw), Some(factor), "raw {raw}");
        }
        assert_eq!(alpha_blend_factor(0), None);
        assert_eq!(alpha_blend_factor(11), None);
    }

    #[test]
    fn blend_translation_rejects_unknown_factors_only_when_enabled() {
        let desc = translate_blend(true, d3d9::D3DBLEND_SRCCOLOR, d3d9::D3DBLEND_INVDESTCOLOR)
            .unwrap();
        assert_eq!(desc.src, BlendFactor::SrcColor);
        assert_eq!(desc.dst, BlendFactor::InvDestColor);
        assert_eq!(desc.src_alpha, BlendFactor::SrcAlpha);
        assert_eq!(desc.dst_alpha, BlendFactor::InvDestAlpha);

        assert_eq!(translate_blend(true, 13, d3d9::D3DBLEND_ONE), None);
        assert_eq!(translate_blend(false, 13, 99).map(|d| d.enable), Some(false));
    }

    #[test]
    fn clockwise_cull_maps_to_native_front() {
        let desc = translate_rasterizer(d3d9::D3DCULL_CW, d3d9::D3DFILL_SOLID).unwrap();
        assert_eq!(desc.cull, CullMode::Front);
        let desc = translate_rasterizer(d3d9::D3DCULL_CCW, d3d9::D3DFILL_WIREFRAME).unwrap();
        assert_eq!(desc.cull, CullMode::Back);
        assert_eq!(desc.fill, FillMode::Wireframe);
        // Point fill is not part of the recognized set.
        assert_eq!(translate_rasterizer(d3d9::D3DCULL_NONE, 1), None);
    }

    #[test]
    fn sampler_translation_covers_recognized_set() {
        for filter in [d3d9::D3DTEXF_POINT, d3d9::D3DTEXF_LINEAR] {
            for address in [d3d9::D3DTADDRESS_WRAP, d3d9::D3DTADDRESS_MIRROR, d3d9::D3DTADDRESS_CLAMP] {
                assert!(translate_sampler(filter, address).is_some());
            }
        }
        assert_eq!(translate_sampler(3, d3d9::D3DTADDRESS_WRAP), None);
        assert_eq!(translate_sampler(d3d9::D3DTEXF_POINT, 4), None);
    }

    #[test]
    fn cache_creates_each_combination_once() {
        let mut backend = SoftGpuBackend::new();
        let mut cache = StateCache::<SoftGpuBackend>::new();
        let additive = translate_blend(true, d3d9::D3DBLEND_ONE, d3d9::D3DBLEND_ONE).unwrap();

        let first = cache.blend(&mut backend, &additive).unwrap().id();
        let second = cache.blend(&mut backend, &additive).unwrap().id();
        assert_eq!(first, second);
        assert_eq!(backend.created(ObjectKind::BlendState), 1);

        cache.depth(&mut backend, &depth_desc(true)).unwrap();
        cache.depth(&mut backend, &depth_desc(false)).unwrap();
        assert_eq!(backend.created(ObjectKind::DepthStencilState), 2);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn failed_creation_is_not_cached() {
        let mut backend = SoftGpuBackend::new();
        let mut cache = StateCache::<SoftGpuBackend>::new();
        let desc = translate_sampler(d3d9::D3DTEXF_LINEAR, d3d9::D3DTADDRESS_CLAMP).unwrap();

        backend.fail_next_creations(1);
        assert!(cache.sampler(&mut backend, &desc).is_err());
        assert!(cache.is_empty());
        assert!(cache.sampler(&mut backend, &desc).is_ok());
        assert_eq!(cache.len(), 1);
    }
}
