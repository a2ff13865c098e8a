//! Maps the unified [`Register`] enum onto fields of a concrete [`Registers`]
//! save record.

use vmi_core::Register;

use crate::{Registers, SegmentDescriptor};

enum Field {
    Selector,
    Base,
    Limit,
    Attr,
}

fn segment_field_get(seg: &SegmentDescriptor, field: Field) -> u64 {
    match field {
        Field::Selector => u16::from(seg.selector) as u64,
        Field::Base => seg.base,
        Field::Limit => seg.limit as u64,
        Field::Attr => u32::from(seg.access) as u64,
    }
}

fn segment_field_set(seg: &mut SegmentDescriptor, field: Field, value: u64) {
    match field {
        Field::Selector => seg.selector = (value as u16).into(),
        Field::Base => seg.base = value,
        Field::Limit => seg.limit = value as u32,
        Field::Attr => seg.access = (value as u32).into(),
    }
}

/// Returns whether `reg` is in the register subset a paravirtualized
/// guest's context call actually exposes: no segment attributes/limits, no
/// full MSR bank. A hardware-virt backend supports every register
/// [`register_get`]/[`register_set`] know about; a paravirt backend must
/// additionally check this before calling them, per the backend-specific
/// rules in the register marshaller's contract.
pub fn is_pv_supported(reg: Register) -> bool {
    use Register::*;

    !matches!(
        reg,
        CsAttr
            | CsLimit
            | DsAttr
            | DsLimit
            | EsAttr
            | EsLimit
            | FsAttr
            | FsLimit
            | GsAttr
            | GsLimit
            | SsAttr
            | SsLimit
            | TrAttr
            | TrLimit
            | LdtrAttr
            | LdtrLimit
            | MsrFlags
            | MsrLstar
            | MsrCstar
            | MsrSyscallMask
            | MsrEfer
            | MsrTscAux
    )
}

/// Reads `reg` out of `ctx`.
///
/// Returns `None` for [`Register`] variants this architecture doesn't know
/// about (the enum is `#[non_exhaustive]`, so future variants are possible).
pub fn register_get(ctx: &Registers, reg: Register) -> Option<u64> {
    use Register::*;

    Some(match reg {
        Rax => ctx.rax,
        Rbx => ctx.rbx,
        Rcx => ctx.rcx,
        Rdx => ctx.rdx,
        Rsi => ctx.rsi,
        Rdi => ctx.rdi,
        Rbp => ctx.rbp,
        Rsp => ctx.rsp,
        R8 => ctx.r8,
        R9 => ctx.r9,
        R10 => ctx.r10,
        R11 => ctx.r11,
        R12 => ctx.r12,
        R13 => ctx.r13,
        R14 => ctx.r14,
        R15 => ctx.r15,
        Rip => ctx.rip,
        Rflags => ctx.rflags.into(),

        Cr0 => ctx.cr0.into(),
        Cr2 => ctx.cr2.into(),
        Cr3 => ctx.cr3.into(),
        Cr4 => ctx.cr4.into(),

        Dr0 => ctx.dr0.into(),
        Dr1 => ctx.dr1.into(),
        Dr2 => ctx.dr2.into(),
        Dr3 => ctx.dr3.into(),
        Dr6 => ctx.dr6.into(),
        Dr7 => ctx.dr7.into(),

        CsSelector => segment_field_get(&ctx.cs, Field::Selector),
        CsBase => segment_field_get(&ctx.cs, Field::Base),
        CsLimit => segment_field_get(&ctx.cs, Field::Limit),
        CsAttr => segment_field_get(&ctx.cs, Field::Attr),

        DsSelector => segment_field_get(&ctx.ds, Field::Selector),
        DsBase => segment_field_get(&ctx.ds, Field::Base),
        DsLimit => segment_field_get(&ctx.ds, Field::Limit),
        DsAttr => segment_field_get(&ctx.ds, Field::Attr),

        EsSelector => segment_field_get(&ctx.es, Field::Selector),
        EsBase => segment_field_get(&ctx.es, Field::Base),
        EsLimit => segment_field_get(&ctx.es, Field::Limit),
        EsAttr => segment_field_get(&ctx.es, Field::Attr),

        FsSelector => segment_field_get(&ctx.fs, Field::Selector),
        FsBase => segment_field_get(&ctx.fs, Field::Base),
        FsLimit => segment_field_get(&ctx.fs, Field::Limit),
        FsAttr => segment_field_get(&ctx.fs, Field::Attr),

        GsSelector => segment_field_get(&ctx.gs, Field::Selector),
        GsBase => segment_field_get(&ctx.gs, Field::Base),
        GsLimit => segment_field_get(&ctx.gs, Field::Limit),
        GsAttr => segment_field_get(&ctx.gs, Field::Attr),

        SsSelector => segment_field_get(&ctx.ss, Field::Selector),
        SsBase => segment_field_get(&ctx.ss, Field::Base),
        SsLimit => segment_field_get(&ctx.ss, Field::Limit),
        SsAttr => segment_field_get(&ctx.ss, Field::Attr),

        TrSelector => segment_field_get(&ctx.tr, Field::Selector),
        TrBase => segment_field_get(&ctx.tr, Field::Base),
        TrLimit => segment_field_get(&ctx.tr, Field::Limit),
        TrAttr => segment_field_get(&ctx.tr, Field::Attr),

        LdtrSelector => segment_field_get(&ctx.ldtr, Field::Selector),
        LdtrBase => segment_field_get(&ctx.ldtr, Field::Base),
        LdtrLimit => segment_field_get(&ctx.ldtr, Field::Limit),
        LdtrAttr => segment_field_get(&ctx.ldtr, Field::Attr),

        IdtrBase => ctx.idtr.base,
        IdtrLimit => ctx.idtr.limit as u64,
        GdtrBase => ctx.gdtr.base,
        GdtrLimit => ctx.gdtr.limit as u64,

        SysenterCs => ctx.sysenter_cs,
        SysenterEsp => ctx.sysenter_esp,
        SysenterEip => ctx.sysenter_eip,

        ShadowGs => ctx.shadow_gs,

        MsrFlags => ctx.msr_flags,
        MsrLstar => ctx.msr_lstar,
        MsrCstar => ctx.msr_cstar,
        MsrSyscallMask => ctx.msr_syscall_mask,
        MsrEfer => ctx.msr_efer.into(),
        MsrTscAux => ctx.msr_tsc_aux,

        Tsc => ctx.tsc,

        _ => return None,
    })
}

/// Writes `value` into `reg` of `ctx`.
///
/// Returns `None` for [`Register`] variants this architecture doesn't know
/// about, leaving `ctx` unmodified.
pub fn register_set(ctx: &mut Registers, reg: Register, value: u64) -> Option<()> {
    use Register::*;

    match reg {
        Rax => ctx.rax = value,
        Rbx => ctx.rbx = value,
        Rcx => ctx.rcx = value,
        Rdx => ctx.rdx = value,
        Rsi => ctx.rsi = value,
        Rdi => ctx.rdi = value,
        Rbp => ctx.rbp = value,
        Rsp => ctx.rsp = value,
        R8 => ctx.r8 = value,
        R9 => ctx.r9 = value,
        R10 => ctx.r10 = value,
        R11 => ctx.r11 = value,
        R12 => ctx.r12 = value,
        R13 => ctx.r13 = value,
        R14 => ctx.r14 = value,
        R15 => ctx.r15 = value,
        Rip => ctx.rip = value,
        Rflags => ctx.rflags = value.into(),

        Cr0 => ctx.cr0 = value.into(),
        Cr2 => ctx.cr2 = value.into(),
        Cr3 => ctx.cr3 = value.into(),
        Cr4 => ctx.cr4 = value.into(),

        Dr0 => ctx.dr0 = value.into(),
        Dr1 => ctx.dr1 = value.into(),
        Dr2 => ctx.dr2 = value.into(),
        Dr3 => ctx.dr3 = value.into(),
        Dr6 => ctx.dr6 = value.into(),
        Dr7 => ctx.dr7 = value.into(),

        CsSelector => segment_field_set(&mut ctx.cs, Field::Selector, value),
        CsBase => segment_field_set(&mut ctx.cs, Field::Base, value),
        CsLimit => segment_field_set(&mut ctx.cs, Field::Limit, value),
        CsAttr => segment_field_set(&mut ctx.cs, Field::Attr, value),

        DsSelector => segment_field_set(&mut ctx.ds, Field::Selector, value),
        DsBase => segment_field_set(&mut ctx.ds, Field::Base, value),
        DsLimit => segment_field_set(&mut ctx.ds, Field::Limit, value),
        DsAttr => segment_field_set(&mut ctx.ds, Field::Attr, value),

        EsSelector => segment_field_set(&mut ctx.es, Field::Selector, value),
        EsBase => segment_field_set(&mut ctx.es, Field::Base, value),
        EsLimit => segment_field_set(&mut ctx.es, Field::Limit, value),
        EsAttr => segment_field_set(&mut ctx.es, Field::Attr, value),

        FsSelector => segment_field_set(&mut ctx.fs, Field::Selector, value),
        FsBase => segment_field_set(&mut ctx.fs, Field::Base, value),
        FsLimit => segment_field_set(&mut ctx.fs, Field::Limit, value),
        FsAttr => segment_field_set(&mut ctx.fs, Field::Attr, value),

        GsSelector => segment_field_set(&mut ctx.gs, Field::Selector, value),
        GsBase => segment_field_set(&mut ctx.gs, Field::Base, value),
        GsLimit => segment_field_set(&mut ctx.gs, Field::Limit, value),
        GsAttr => segment_field_set(&mut ctx.gs, Field::Attr, value),

        SsSelector => segment_field_set(&mut ctx.ss, Field::Selector, value),
        SsBase => segment_field_set(&mut ctx.ss, Field::Base, value),
        SsLimit => segment_field_set(&mut ctx.ss, Field::Limit, value),
        SsAttr => segment_field_set(&mut ctx.ss, Field::Attr, value),

        TrSelector => segment_field_set(&mut ctx.tr, Field::Selector, value),
        TrBase => segment_field_set(&mut ctx.tr, Field::Base, value),
        TrLimit => segment_field_set(&mut ctx.tr, Field::Limit, value),
        TrAttr => segment_field_set(&mut ctx.tr, Field::Attr, value),

        LdtrSelector => segment_field_set(&mut ctx.ldtr, Field::Selector, value),
        LdtrBase => segment_field_set(&mut ctx.ldtr, Field::Base, value),
        LdtrLimit => segment_field_set(&mut ctx.ldtr, Field::Limit, value),
        LdtrAttr => segment_field_set(&mut ctx.ldtr, Field::Attr, value),

        IdtrBase => ctx.idtr.base = value,
        IdtrLimit => ctx.idtr.limit = value as u32,
        GdtrBase => ctx.gdtr.base = value,
        GdtrLimit => ctx.gdtr.limit = value as u32,

        SysenterCs => ctx.sysenter_cs = value,
        SysenterEsp => ctx.sysenter_esp = value,
        SysenterEip => ctx.sysenter_eip = value,

        ShadowGs => ctx.shadow_gs = value,

        MsrFlags => ctx.msr_flags = value,
        MsrLstar => ctx.msr_lstar = value,
        MsrCstar => ctx.msr_cstar = value,
        MsrSyscallMask => ctx.msr_syscall_mask = value,
        MsrEfer => ctx.msr_efer = value.into(),
        MsrTscAux => ctx.msr_tsc_aux = value,

        Tsc => ctx.tsc = value,

        _ => return None,
    }

    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpr_round_trip() {
        let mut ctx = Registers::default();
        register_set(&mut ctx, Register::Rax, 0x1234).unwrap();
        assert_eq!(register_get(&ctx, Register::Rax), Some(0x1234));
    }

    #[test]
    fn segment_attr_round_trip() {
        let mut ctx = Registers::default();
        register_set(&mut ctx, Register::CsSelector, 0x33).unwrap();
        register_set(&mut ctx, Register::CsAttr, 0xa09b).unwrap();
        assert_eq!(register_get(&ctx, Register::CsSelector), Some(0x33));
        assert_eq!(register_get(&ctx, Register::CsAttr), Some(0xa09b));
    }

    #[test]
    fn control_register_round_trip() {
        let mut ctx = Registers::default();
        register_set(&mut ctx, Register::Cr3, 0x0018_1000).unwrap();
        assert_eq!(register_get(&ctx, Register::Cr3), Some(0x0018_1000));
    }

    #[test]
    fn pv_subset_excludes_segment_attrs_limits_and_msr_bank() {
        assert!(!is_pv_supported(Register::CsAttr));
        assert!(!is_pv_supported(Register::CsLimit));
        assert!(!is_pv_supported(Register::MsrEfer));
        assert!(!is_pv_supported(Register::MsrLstar));
    }

    #[test]
    fn pv_subset_includes_gprs_and_segment_selectors() {
        assert!(is_pv_supported(Register::Rax));
        assert!(is_pv_supported(Register::Cr3));
        assert!(is_pv_supported(Register::CsSelector));
        assert!(is_pv_supported(Register::CsBase));
    }
}
