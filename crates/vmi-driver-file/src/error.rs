use vmi_core::VmiError;

/// Error type for the flat-file driver, before translation into [`VmiError`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to open or map the snapshot file.
    #[error("failed to open snapshot: {0}")]
    Io(#[from] std::io::Error),

    /// The requested range falls outside the snapshot.
    #[error("out of bounds")]
    OutOfBounds,
}

impl From<Error> for VmiError {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(error) => Self::InitFailure(Box::new(error)),
            Error::OutOfBounds => Self::OutOfBounds,
        }
    }
}
