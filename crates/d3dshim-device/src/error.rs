use thiserror::Error;

use crate::backend::BackendError;
use crate::reflection::ReflectionError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShimError {
    /// A buffer, texture, view, shader or state object could not be created.
    #[error("failed to create {what}: {source}")]
    ResourceCreation {
        what: &'static str,
        #[source]
        source: BackendError,
    },
    /// The shader is usable, but not with named constants.
    #[error("shader reflection failed: {0}")]
    Reflection(#[from] ReflectionError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ShimError {
    pub(crate) fn creation(what: &'static str) -> impl FnOnce(BackendError) -> Self {
        move |source| Self::ResourceCreation { what, source }
    }

    pub fn is_reflection_failure(&self) -> bool {
        matches!(self, Self::Reflection(_))
    }
}
