use super::{ManagedContainer, Result};

pub trait TargetGroupPersister: Send + Sync + 'static {
    /// Replaces the persisted document with `snapshot`, which is sorted by
    /// container id.
    fn write(
        &self,
        snapshot: &[ManagedContainer],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
