use vmi_core::VmiError;

/// Error type for the Xen driver, before translation into [`VmiError`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error returned by the hypervisor control library.
    #[error("xen error: {0}")]
    Xen(#[from] xen::XenError),

    /// An I/O error occurred (e.g. polling the event channel).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The given timeout is invalid.
    #[error("invalid timeout")]
    InvalidTimeout,

    /// Operation not supported by this backend.
    #[error("operation not supported")]
    NotSupported,

    /// A write would cross the end of the mapped frame.
    #[error("out of bounds")]
    OutOfBounds,

    /// `events_listen` timed out waiting for a notification.
    #[error("timed out")]
    Timeout,

    /// No domain matches the given name or id.
    #[error("domain not found")]
    NotFound,

    /// The guest reported a paging mode this library doesn't recognize, or
    /// an address width other than 4 or 8 bytes.
    #[error("unrecognized guest address width")]
    InvalidAddressWidth,
}

impl From<Error> for VmiError {
    fn from(error: Error) -> Self {
        match error {
            Error::Xen(error) => Self::AccessFailure(Box::new(error)),
            Error::Io(error) => Self::Io(error),
            Error::InvalidTimeout => Self::InvalidTimeout,
            Error::NotSupported => Self::Unsupported,
            Error::OutOfBounds => Self::OutOfBounds,
            Error::Timeout => Self::Timeout,
            Error::NotFound => Self::NotFound,
            Error::InvalidAddressWidth => Self::InvalidAddressWidth,
        }
    }
}
