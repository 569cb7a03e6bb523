use tracing::debug;

/// Smallest vertex capacity that still leaves room for a one-triangle fan buffer.
pub const MIN_VERTEX_CAPACITY: u32 = 18;
/// Largest vertex capacity whose fan indices all fit in 16 bits.
pub const MAX_VERTEX_CAPACITY: u32 = 6 * 65536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShimConfig {
    /// Vertices the dynamic vertex buffer holds; the index buffer holds a sixth of that.
    pub vertex_capacity: u32,
    /// Report clamped uploads and ignored state at `warn` instead of `debug`.
    pub validation: bool,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            vertex_capacity: 3072,
            validation: false,
        }
    }
}

impl ShimConfig {
    /// Defaults overridden by `D3DSHIM_VERTEX_CAPACITY` and `D3DSHIM_VALIDATION`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup("D3DSHIM_VERTEX_CAPACITY") {
            match raw.trim().parse::<u32>() {
                Ok(capacity) => config.vertex_capacity = capacity,
                Err(err) => debug!(%raw, %err, "ignoring invalid D3DSHIM_VERTEX_CAPACITY"),
            }
        }
        config.validation = lookup("D3DSHIM_VALIDATION").is_some_and(|v| is_truthy(&v));
        config
    }

    /// The vertex capacity actually used.
    pub fn clamped_vertex_capacity(&self) -> u32 {
        self.vertex_capacity
            .clamp(MIN_VERTEX_CAPACITY, MAX_VERTEX_CAPACITY)
    }
}

fn is_truthy(raw: &str) -> bool {
    let v = raw.trim();
    v == "1"
        || v.eq_ignore_ascii_case("true")
        || v.eq_ignore_ascii_case("yes")
        || v.eq_ignore_ascii_case("on")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_owned())
        }
    }

    #[test]
    fn defaults_without_environment() {
        assert_eq!(ShimConfig::from_lookup(lookup(&[])), ShimConfig::default());
        assert_eq!(ShimConfig::default().vertex_capacity, 3072);
    }

    #[test]
    fn environment_overrides() {
        let config = ShimConfig::from_lookup(lookup(&[
            ("D3DSHIM_VERTEX_CAPACITY", " 6000 "),
            ("D3DSHIM_VALIDATION", "Yes"),
        ]));
        assert_eq!(config.vertex_capacity, 6000);
        assert!(config.validation);

        let config = ShimConfig::from_lookup(lookup(&[
            ("D3DSHIM_VERTEX_CAPACITY", "lots"),
            ("D3DSHIM_VALIDATION", "0"),
        ]));
        assert_eq!(config.vertex_capacity, 3072);
        assert!(!config.validation);
    }

    #[test]
    fn capacity_is_clamped() {
        let tiny = ShimConfig {
            vertex_capacity: 1,
            ..ShimConfig::default()
        };
        assert_eq!(tiny.clamped_vertex_capacity(), MIN_VERTEX_CAPACITY);
        let huge = ShimConfig {
            vertex_capacity: u32::MAX,
            ..ShimConfig::default()
        };
        assert_eq!(huge.clamped_vertex_capacity(), MAX_VERTEX_CAPACITY);
    }
}
