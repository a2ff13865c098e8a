//! Conversions between this crate's and `vmi-core`/`vmi-arch-amd64` types and
//! the Xen control library's types.

use vmi_arch_amd64::{Gdtr, Idtr, Registers, SegmentDescriptor};
use vmi_core::{MemoryAccess, VcpuId};
use xen::arch::x86::Registers as XenRegisters;

/// Crate-local trait for conversion between types we don't own on either
/// side (so neither `From` nor `Into` applies).
pub trait FromExt<T>: Sized {
    fn from_ext(value: T) -> Self;
}

/// Crate-local trait for conversion between types we don't own on either
/// side (so neither `From` nor `Into` applies).
pub trait IntoExt<T>: Sized {
    fn into_ext(self) -> T;
}

impl<T, U> IntoExt<U> for T
where
    U: FromExt<T>,
{
    fn into_ext(self) -> U {
        U::from_ext(self)
    }
}

impl FromExt<VcpuId> for xen::VcpuId {
    fn from_ext(value: VcpuId) -> Self {
        Self(value.0 as u32)
    }
}

impl FromExt<MemoryAccess> for xen::MemoryAccess {
    fn from_ext(value: MemoryAccess) -> Self {
        Self::from_bits_truncate(value.bits())
    }
}

impl FromExt<xen::MemoryAccess> for MemoryAccess {
    fn from_ext(value: xen::MemoryAccess) -> Self {
        Self::from_bits_truncate(value.bits())
    }
}

impl FromExt<XenRegisters> for Registers {
    fn from_ext(value: XenRegisters) -> Self {
        Self {
            rax: value.rax,
            rbx: value.rbx,
            rcx: value.rcx,
            rdx: value.rdx,
            rbp: value.rbp,
            rsi: value.rsi,
            rdi: value.rdi,
            rsp: value.rsp,
            r8: value.r8,
            r9: value.r9,
            r10: value.r10,
            r11: value.r11,
            r12: value.r12,
            r13: value.r13,
            r14: value.r14,
            r15: value.r15,
            rip: value.rip,
            rflags: value.rflags.into(),

            cr0: value.cr0.into(),
            cr2: value.cr2.into(),
            cr3: value.cr3.into(),
            cr4: value.cr4.into(),

            dr0: value.dr0.into(),
            dr1: value.dr1.into(),
            dr2: value.dr2.into(),
            dr3: value.dr3.into(),
            dr6: value.dr6.into(),
            dr7: value.dr7.into(),

            cs: SegmentDescriptor {
                base: value.cs_base,
                limit: value.cs_limit,
                selector: value.cs_sel.into(),
                access: value.cs_arbytes.into(),
            },
            ds: SegmentDescriptor {
                base: value.ds_base,
                limit: value.ds_limit,
                selector: value.ds_sel.into(),
                access: value.ds_arbytes.into(),
            },
            es: SegmentDescriptor {
                base: value.es_base,
                limit: value.es_limit,
                selector: value.es_sel.into(),
                access: value.es_arbytes.into(),
            },
            fs: SegmentDescriptor {
                base: value.fs_base,
                limit: value.fs_limit,
                selector: value.fs_sel.into(),
                access: value.fs_arbytes.into(),
            },
            gs: SegmentDescriptor {
                base: value.gs_base,
                limit: value.gs_limit,
                selector: value.gs_sel.into(),
                access: value.gs_arbytes.into(),
            },
            ss: SegmentDescriptor {
                base: value.ss_base,
                limit: value.ss_limit,
                selector: value.ss_sel.into(),
                access: value.ss_arbytes.into(),
            },
            tr: SegmentDescriptor {
                base: value.tr_base,
                limit: value.tr_limit,
                selector: value.tr_sel.into(),
                access: value.tr_arbytes.into(),
            },
            ldtr: SegmentDescriptor {
                base: value.ldtr_base,
                limit: value.ldtr_limit,
                selector: value.ldtr_sel.into(),
                access: value.ldtr_arbytes.into(),
            },

            idtr: Idtr {
                base: value.idtr_base,
                limit: value.idtr_limit,
            },
            gdtr: Gdtr {
                base: value.gdtr_base,
                limit: value.gdtr_limit,
            },

            sysenter_cs: value.sysenter_cs,
            sysenter_esp: value.sysenter_esp,
            sysenter_eip: value.sysenter_eip,
            shadow_gs: value.shadow_gs,

            msr_flags: value.msr_flags,
            msr_lstar: value.msr_lstar,
            msr_star: value.msr_star,
            msr_cstar: value.msr_cstar,
            msr_syscall_mask: value.msr_syscall_mask,
            msr_efer: value.msr_efer.into(),
            msr_tsc_aux: value.msr_tsc_aux,
            tsc: 0,
        }
    }
}

impl FromExt<Registers> for XenRegisters {
    fn from_ext(value: Registers) -> Self {
        Self {
            rax: value.rax,
            rbx: value.rbx,
            rcx: value.rcx,
            rdx: value.rdx,
            rbp: value.rbp,
            rsi: value.rsi,
            rdi: value.rdi,
            rsp: value.rsp,
            r8: value.r8,
            r9: value.r9,
            r10: value.r10,
            r11: value.r11,
            r12: value.r12,
            r13: value.r13,
            r14: value.r14,
            r15: value.r15,
            rip: value.rip,
            rflags: value.rflags.into(),

            cr0: value.cr0.into(),
            cr2: value.cr2.into(),
            cr3: value.cr3.into(),
            cr4: value.cr4.into(),

            dr0: value.dr0.into(),
            dr1: value.dr1.into(),
            dr2: value.dr2.into(),
            dr3: value.dr3.into(),
            dr6: value.dr6.into(),
            dr7: value.dr7.into(),

            cs_base: value.cs.base,
            cs_limit: value.cs.limit,
            cs_sel: value.cs.selector.into(),
            cs_arbytes: value.cs.access.into(),

            ds_base: value.ds.base,
            ds_limit: value.ds.limit,
            ds_sel: value.ds.selector.into(),
            ds_arbytes: value.ds.access.into(),

            es_base: value.es.base,
            es_limit: value.es.limit,
            es_sel: value.es.selector.into(),
            es_arbytes: value.es.access.into(),

            fs_base: value.fs.base,
            fs_limit: value.fs.limit,
            fs_sel: value.fs.selector.into(),
            fs_arbytes: value.fs.access.into(),

            gs_base: value.gs.base,
            gs_limit: value.gs.limit,
            gs_sel: value.gs.selector.into(),
            gs_arbytes: value.gs.access.into(),

            ss_base: value.ss.base,
            ss_limit: value.ss.limit,
            ss_sel: value.ss.selector.into(),
            ss_arbytes: value.ss.access.into(),

            tr_base: value.tr.base,
            tr_limit: value.tr.limit,
            tr_sel: value.tr.selector.into(),
            tr_arbytes: value.tr.access.into(),

            ldtr_base: value.ldtr.base,
            ldtr_limit: value.ldtr.limit,
            ldtr_sel: value.ldtr.selector.into(),
            ldtr_arbytes: value.ldtr.access.into(),

            idtr_base: value.idtr.base,
            idtr_limit: value.idtr.limit,

            gdtr_base: value.gdtr.base,
            gdtr_limit: value.gdtr.limit,

            sysenter_cs: value.sysenter_cs,
            sysenter_esp: value.sysenter_esp,
            sysenter_eip: value.sysenter_eip,
            shadow_gs: value.shadow_gs,

            msr_flags: value.msr_flags,
            msr_lstar: value.msr_lstar,
            msr_star: value.msr_star,
            msr_cstar: value.msr_cstar,
            msr_syscall_mask: value.msr_syscall_mask,
            msr_efer: value.msr_efer.into(),
            msr_tsc_aux: value.msr_tsc_aux,
        }
    }
}
