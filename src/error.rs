use thiserror::Error;

/// Error taxonomy for the scheduling core.
///
/// None of these are allowed to escape as a panic: resolution and partition
/// failures degrade to logged no-ops or defaults at the call site, and
/// persistence failures flip the session to local-only storage.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A clip id could not be mapped back to a catalog entry, typically a
    /// stale queue after a catalog rebuild.
    #[error("clip id '{0}' does not resolve to a catalog entry")]
    UnresolvedClip(String),

    /// An imported document did not have the expected top-level shape.
    #[error("invalid import shape: expected {expected}, got {actual}")]
    InvalidImportShape {
        expected: &'static str,
        actual: &'static str,
    },
}
