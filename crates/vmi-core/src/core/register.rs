use serde::{Deserialize, Serialize};

/// A unified register identifier.
///
/// Every backend translates a `Register` value into its own context layout:
/// hardware-virt backends map it onto a field of the partial CPU save record,
/// paravirt backends map it onto the subset their context call actually
/// exposes (see the marshallers in `vmi-arch-amd64` and the driver crates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Register {
    // --- general-purpose registers ---
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,

    /// Instruction pointer (`rip`/`eip`).
    Rip,

    /// Flags register (`rflags`/`eflags`).
    Rflags,

    // --- control registers ---
    Cr0,
    Cr2,
    Cr3,
    Cr4,

    // --- debug registers ---
    Dr0,
    Dr1,
    Dr2,
    Dr3,
    Dr6,
    Dr7,

    // --- segment registers ---
    CsSelector,
    CsBase,
    CsLimit,
    CsAttr,

    DsSelector,
    DsBase,
    DsLimit,
    DsAttr,

    EsSelector,
    EsBase,
    EsLimit,
    EsAttr,

    FsSelector,
    FsBase,
    FsLimit,
    FsAttr,

    GsSelector,
    GsBase,
    GsLimit,
    GsAttr,

    SsSelector,
    SsBase,
    SsLimit,
    SsAttr,

    TrSelector,
    TrBase,
    TrLimit,
    TrAttr,

    LdtrSelector,
    LdtrBase,
    LdtrLimit,
    LdtrAttr,

    // --- descriptor tables ---
    IdtrBase,
    IdtrLimit,
    GdtrBase,
    GdtrLimit,

    // --- SYSENTER ---
    SysenterCs,
    SysenterEsp,
    SysenterEip,

    /// `IA32_KERNEL_GS_BASE` (shadow GS base, swapped in on `swapgs`).
    ShadowGs,

    // --- MSRs ---
    MsrFlags,
    MsrLstar,
    MsrCstar,
    MsrSyscallMask,
    MsrEfer,
    MsrTscAux,

    /// Time-stamp counter.
    Tsc,
}

impl Register {
    /// Returns `true` if this register is part of the reduced subset that
    /// paravirtualized guests expose through their context call: general
    /// purpose registers, instruction pointer, flags, and control/debug
    /// registers. Segment attributes/limits and the full MSR bank are
    /// hardware-virt only.
    pub fn is_paravirt_subset(self) -> bool {
        use Register::*;

        matches!(
            self,
            Rax | Rbx
                | Rcx
                | Rdx
                | Rsi
                | Rdi
                | Rbp
                | Rsp
                | R8
                | R9
                | R10
                | R11
                | R12
                | R13
                | R14
                | R15
                | Rip
                | Rflags
                | Cr0
                | Cr2
                | Cr3
                | Cr4
                | Dr0
                | Dr1
                | Dr2
                | Dr3
                | Dr6
                | Dr7
        )
    }
}
