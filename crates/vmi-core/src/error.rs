use crate::AddressContext;

/// An error that can occur when working with the VMI.
///
/// Every public call returns success or failure through this type; there is
/// no hidden control flow. Backend-specific detail is carried as opaque
/// boxed errors and is only ever surfaced as debug text.
#[derive(thiserror::Error, Debug)]
pub enum VmiError {
    /// Initialization failed: a bad id/name was given, or the backend is
    /// unreachable.
    #[error("initialization failed: {0}")]
    InitFailure(Box<dyn std::error::Error + Send + Sync>),

    /// The operation is not implemented by the backend, or the register is
    /// not in the backend's supported subset.
    #[error("operation not supported")]
    Unsupported,

    /// A frame mapping or register fetch/set was denied by the backend.
    #[error("access failed: {0}")]
    AccessFailure(Box<dyn std::error::Error + Send + Sync>),

    /// An event is already registered at that key, or combining access modes
    /// produced an invalid result.
    #[error("conflicting registration")]
    Conflict,

    /// `clear_event` (or similar) was called on a key with no registration.
    #[error("no registration found")]
    NotFound,

    /// An OS-specific error occurred.
    #[error(transparent)]
    Os(Box<dyn std::error::Error + Send + Sync>),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A virtual-to-physical translation error occurred.
    #[error("translation error ({:?}, len: {})", .0[0], .0.len())]
    Translation(PageFaults),

    /// The given address has an invalid width.
    #[error("invalid address width")]
    InvalidAddressWidth,

    /// The given timeout is invalid.
    #[error("the given timeout is invalid")]
    InvalidTimeout,

    /// Out of bounds.
    #[error("out of bounds")]
    OutOfBounds,

    /// The paging root was not present.
    #[error("root not present")]
    RootNotPresent,

    /// The operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// Other error.
    #[error("{0}")]
    Other(&'static str),
}

/// A collection of page faults.
pub type PageFaults = smallvec::SmallVec<[AddressContext; 1]>;

impl VmiError {
    /// Creates a new page fault error.
    pub fn page_fault(pf: impl Into<AddressContext>) -> Self {
        Self::Translation(smallvec::smallvec![pf.into()])
    }

    /// Creates a new page fault error with multiple page faults.
    pub fn page_faults(pfs: impl IntoIterator<Item = AddressContext>) -> Self {
        Self::Translation(pfs.into_iter().collect())
    }
}

impl From<crate::Invalid> for VmiError {
    fn from(_: crate::Invalid) -> Self {
        VmiError::Conflict
    }
}
