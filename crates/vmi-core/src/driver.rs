use crate::{AccessMode, MemoryAccess, Pa, Pfn, Register, VcpuId, VmiError, VmiInfo, VmiMappedPage};

/// A raw event delivered by a backend through [`VmiDriver::events_listen`].
///
/// The event registry matches these against its registration tables and
/// invokes the corresponding user callback; a raw event with no matching
/// registration is silently dropped (the backend may deliver stragglers
/// around the point a registration was cleared).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    /// A monitored memory access occurred.
    Memory {
        /// The vCPU that triggered the access.
        vcpu: VcpuId,

        /// The physical page frame that was accessed.
        pfn: Pfn,

        /// The byte offset within the page, if the backend can report
        /// byte-level granularity.
        offset: Option<u16>,

        /// The kind of access that occurred.
        access: MemoryAccess,
    },

    /// A monitored register was read or written.
    Register {
        /// The vCPU on which the access occurred.
        vcpu: VcpuId,

        /// The register that was accessed.
        register: Register,
    },

    /// A vCPU completed a single-stepped instruction.
    SingleStep {
        /// The vCPU that single-stepped.
        vcpu: VcpuId,
    },
}

/// The contract every backend (Xen, KVM, file) implements.
///
/// This is the one consolidated interface the session dispatcher talks to:
/// memory access, register access, and the event plane all live on the same
/// trait. The event-plane methods default to [`VmiError::Unsupported`] so a
/// backend that cannot deliver events (notably the file/snapshot backend)
/// need not implement them at all.
pub trait VmiDriver: Sized {
    /// Returns static information about the instance gathered at
    /// initialization: address width, page size, memory size, vCPU count,
    /// paravirtualization flag.
    fn info(&self) -> &VmiInfo;

    /// Releases every resource acquired during construction. Idempotent.
    fn destroy(&mut self) -> Result<(), VmiError>;

    /// Returns a host-addressable view of one guest page.
    ///
    /// The returned [`VmiMappedPage`] releases the mapping when its last
    /// clone is dropped; there is no separate `release_frame` call.
    fn map_frame(&self, pfn: Pfn, protection: MemoryAccess) -> Result<VmiMappedPage, VmiError>;

    /// Writes `buf` starting at `paddr`. May span multiple pages; the
    /// backend slices internally. On a mid-write failure, prior slices are
    /// **not** rolled back.
    fn write(&self, paddr: Pa, buf: &[u8]) -> Result<(), VmiError>;

    /// Reads the value of `reg` on `vcpu`.
    fn get_vcpureg(&self, reg: Register, vcpu: VcpuId) -> Result<u64, VmiError>;

    /// Sets the value of `reg` on `vcpu`. Callers MUST pause the VM first.
    fn set_vcpureg(&self, reg: Register, vcpu: VcpuId, value: u64) -> Result<(), VmiError>;

    /// Pauses every vCPU.
    fn pause(&self) -> Result<(), VmiError>;

    /// Resumes every vCPU.
    fn resume(&self) -> Result<(), VmiError>;

    /// Programs register-level event monitoring for `reg`. Optional.
    fn set_reg_access(&self, _reg: Register, _access: AccessMode) -> Result<(), VmiError> {
        Err(VmiError::Unsupported)
    }

    /// Programs the effective memory-access mask for the page containing
    /// `pfn`. Optional.
    fn set_mem_access(&self, _pfn: Pfn, _access: AccessMode) -> Result<(), VmiError> {
        Err(VmiError::Unsupported)
    }

    /// Arms single-step monitoring on `vcpu`. Optional.
    fn start_single_step(&self, _vcpu: VcpuId) -> Result<(), VmiError> {
        Err(VmiError::Unsupported)
    }

    /// Disarms single-step monitoring on `vcpu`. Optional.
    fn stop_single_step(&self, _vcpu: VcpuId) -> Result<(), VmiError> {
        Err(VmiError::Unsupported)
    }

    /// Disarms single-step monitoring on every vCPU. Optional.
    fn shutdown_single_step(&self) -> Result<(), VmiError> {
        Err(VmiError::Unsupported)
    }

    /// Blocks up to `timeout_ms` (0 = non-blocking poll) dispatching
    /// incoming hypervisor notifications. Optional.
    fn events_listen(&self, _timeout_ms: u32) -> Result<Vec<RawEvent>, VmiError> {
        Err(VmiError::Unsupported)
    }
}
