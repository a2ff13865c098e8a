use vmi_core::VmiError;

/// Error type for the KVM driver, before translation into [`VmiError`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred talking to the monitor or GDB socket.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The monitor returned a malformed or unparseable JSON reply.
    #[error("malformed QMP reply: {0}")]
    Qmp(#[from] serde_json::Error),

    /// The monitor executed the command but reported failure.
    #[error("QMP command failed: {0}")]
    QmpCommand(String),

    /// The GDB remote serial protocol reply failed its checksum, or the
    /// connection closed mid-packet.
    #[error("malformed GDB remote serial protocol reply")]
    GdbProtocol,

    /// The GDB stub replied with an `E` (error) packet.
    #[error("GDB stub reported error {0:#04x}")]
    GdbError(u8),

    /// The register is outside the subset this backend can fetch or set.
    #[error("register not supported by this backend")]
    UnsupportedRegister,

    /// A write would cross the end of guest memory as last reported by the
    /// monitor.
    #[error("out of bounds")]
    OutOfBounds,

    /// No vCPU/domain state is available (e.g. queried before `query-cpus`
    /// returned at least one entry).
    #[error("no vcpu information available")]
    NotFound,
}

impl From<Error> for VmiError {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(error) => Self::Io(error),
            Error::Qmp(error) => Self::InitFailure(Box::new(error)),
            Error::QmpCommand(message) => Self::AccessFailure(message.into()),
            Error::GdbProtocol => Self::AccessFailure("malformed GDB reply".into()),
            Error::GdbError(code) => Self::AccessFailure(format!("GDB error {code:#04x}").into()),
            Error::UnsupportedRegister => Self::Unsupported,
            Error::OutOfBounds => Self::OutOfBounds,
            Error::NotFound => Self::NotFound,
        }
    }
}
