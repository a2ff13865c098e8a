//! AMD64 architecture definitions: register layout, control/debug/segment
//! register bitfields, the page-table walk, and the marshaller that maps the
//! unified [`Register`](vmi_core::Register) enum onto a concrete
//! [`Registers`] save record.

mod address;
mod cr;
mod descriptor;
mod dr;
mod efer;
mod marshal;
mod memory;
mod paging;
mod registers;
mod rflags;
mod segment;
mod translation;

pub(crate) use vmi_core::Pa;
use vmi_core::{AccessContext, AddressContext, Pfn, Va, VmiError, VmiMappedPage};
use zerocopy::FromBytes;

pub use self::{
    cr::{ControlRegister, Cr0, Cr2, Cr3, Cr4},
    descriptor::{Gdtr, Idtr},
    dr::{Dr0, Dr1, Dr2, Dr3, Dr6, Dr7},
    efer::MsrEfer,
    marshal::{is_pv_supported, register_get, register_set},
    paging::{LegacyPageTableEntry, PageTableEntry, PageTableLevel, PagingMode},
    registers::{GpRegisters, Registers},
    rflags::Rflags,
    segment::{
        DescriptorTable, DescriptorType, Granularity, OperationSize, SegmentAccess,
        SegmentDescriptor, Selector,
    },
    translation::{TranslationEntries, TranslationEntry, VaTranslation},
};

/// AMD64 architecture constants and page-table walk.
///
/// Unlike the generic, multi-architecture design this crate's sibling
/// workspaces sometimes use, `Amd64` is not behind a trait: the whole point
/// of this crate is that it only ever targets one architecture, so the
/// constants and the walk are plain associated items.
#[derive(Debug)]
pub struct Amd64;

impl Amd64 {
    /// The size of a page, in bytes.
    pub const PAGE_SIZE: u64 = 0x1000;

    /// `log2(PAGE_SIZE)`.
    pub const PAGE_SHIFT: u64 = 12;

    /// Mask that clears the intra-page offset bits of a physical address.
    pub const PAGE_MASK: u64 = 0xFFFF_FFFF_FFFF_F000;

    /// The `int3` opcode, used as a software breakpoint.
    pub const BREAKPOINT: &'static [u8] = &[0xcc];

    /// Canonicalizes a virtual address (sign-extends bit 47 through the top
    /// 16 bits).
    pub fn va_canonical(va: Va) -> Va {
        const BITS: u32 = 48;
        let shift = 64 - BITS;
        Va((((va.0 << shift) as i64) >> shift) as u64)
    }

    /// Determines the paging mode of the processor based on control
    /// register and `EFER` values.
    ///
    /// - **No paging**: `CR0.PG = 0`.
    /// - **Legacy (32-bit) paging**: `CR0.PG = 1`, `CR4.PAE = 0`.
    /// - **PAE paging**: `CR0.PG = 1`, `CR4.PAE = 1`, `EFER.LME = 0`.
    /// - **4-level (long mode) paging**: `CR0.PG = 1`, `CR4.PAE = 1`,
    ///   `EFER.LME = 1`, `CR4.LA57 = 0`.
    /// - **5-level paging**: as above with `CR4.LA57 = 1`.
    pub fn paging_mode(registers: &Registers) -> Option<PagingMode> {
        if !registers.cr0.paging() {
            return None;
        }

        if !registers.cr4.physical_address_extension() {
            return Some(PagingMode::Legacy);
        }

        if !registers.msr_efer.long_mode_enable() {
            return Some(PagingMode::PAE);
        }

        if !registers.cr4.linear_address_57_bit() {
            return Some(PagingMode::Ia32e);
        }

        Some(PagingMode::Ia32eLA57)
    }

    /// Returns the width, in bytes, of an address under `mode` (4 for
    /// legacy/PAE, 8 for long mode).
    pub fn address_width(mode: PagingMode) -> u64 {
        mode.address_width() as u64
    }

    /// Translates a virtual address to a physical address by walking the
    /// paging structures rooted at `root`, as selected by `mode`.
    ///
    /// `read_page` maps one guest page frame to a host-readable view; it is
    /// supplied by the caller (the session dispatcher in practice) rather
    /// than baked into this function, so the walk has no dependency on any
    /// particular driver or cache.
    ///
    /// Handles 2-level (legacy), 3-level (PAE), and 4-level (long mode)
    /// paging. 5-level paging (`Ia32eLA57`) is walked as if it were 4-level,
    /// i.e. the PML5 level is not consulted — guests running with 57-bit
    /// linear addresses are out of scope.
    ///
    /// Never panics on an unmapped entry; returns [`VmiError::Translation`]
    /// instead.
    pub fn translate_address(
        read_page: impl Fn(Pfn) -> Result<VmiMappedPage, VmiError>,
        va: Va,
        root: Pa,
        mode: PagingMode,
    ) -> Result<Pa, VmiError> {
        let va = Self::va_canonical(va);

        match mode {
            PagingMode::Legacy => Self::translate_legacy(read_page, va, root),
            PagingMode::PAE => Self::translate_pae(read_page, va, root),
            PagingMode::Ia32e | PagingMode::Ia32eLA57 => Self::translate_ia32e(read_page, va, root),
        }
    }

    fn translate_legacy(
        read_page: impl Fn(Pfn) -> Result<VmiMappedPage, VmiError>,
        va: Va,
        root: Pa,
    ) -> Result<Pa, VmiError> {
        let pfn = root.pfn(Self::PAGE_SHIFT);
        let buffer = read_page(pfn)?;
        let table = <[LegacyPageTableEntry]>::ref_from_bytes(&buffer)
            .map_err(|_| VmiError::page_fault((va, root)))?;

        let pdi = ((va.0 >> 22) & 0x3ff) as usize;
        let pde = table[pdi];

        if !pde.present() {
            return Err(VmiError::page_fault((va, root)));
        }

        if pde.large() {
            let offset = va.0 & 0x3f_ffff;
            return Ok(pde.large_pfn().address(Self::PAGE_SHIFT) + offset);
        }

        let buffer = read_page(pde.pfn())?;
        let table = <[LegacyPageTableEntry]>::ref_from_bytes(&buffer)
            .map_err(|_| VmiError::page_fault((va, root)))?;

        let pti = ((va.0 >> 12) & 0x3ff) as usize;
        let pte = table[pti];

        if !pte.present() {
            return Err(VmiError::page_fault((va, root)));
        }

        Ok(pte.pfn().address(Self::PAGE_SHIFT) + (va.0 & 0xfff))
    }

    fn translate_pae(
        read_page: impl Fn(Pfn) -> Result<VmiMappedPage, VmiError>,
        va: Va,
        root: Pa,
    ) -> Result<Pa, VmiError> {
        let pfn = root.pfn(Self::PAGE_SHIFT);
        let buffer = read_page(pfn)?;
        let table = <[PageTableEntry]>::ref_from_bytes(&buffer)
            .map_err(|_| VmiError::page_fault((va, root)))?;

        let pdpti = ((va.0 >> 30) & 0x3) as usize;
        let pdpte = table[pdpti];

        if !pdpte.present() {
            return Err(VmiError::page_fault((va, root)));
        }

        let buffer = read_page(pdpte.pfn())?;
        let table = <[PageTableEntry]>::ref_from_bytes(&buffer)
            .map_err(|_| VmiError::page_fault((va, root)))?;

        let pdi = ((va.0 >> 21) & 0x1ff) as usize;
        let pde = table[pdi];

        if !pde.present() {
            return Err(VmiError::page_fault((va, root)));
        }

        if pde.large() {
            let offset = va.0 & 0x1f_ffff;
            return Ok(pde.pfn().address(Self::PAGE_SHIFT) + offset);
        }

        let buffer = read_page(pde.pfn())?;
        let table = <[PageTableEntry]>::ref_from_bytes(&buffer)
            .map_err(|_| VmiError::page_fault((va, root)))?;

        let pti = ((va.0 >> 12) & 0x1ff) as usize;
        let pte = table[pti];

        if !pte.present() {
            return Err(VmiError::page_fault((va, root)));
        }

        Ok(pte.pfn().address(Self::PAGE_SHIFT) + (va.0 & 0xfff))
    }

    fn translate_ia32e(
        read_page: impl Fn(Pfn) -> Result<VmiMappedPage, VmiError>,
        va: Va,
        root: Pa,
    ) -> Result<Pa, VmiError> {
        let pfn = root.pfn(Self::PAGE_SHIFT);
        let buffer = read_page(pfn)?;
        let table = <[PageTableEntry]>::ref_from_bytes(&buffer)
            .map_err(|_| VmiError::page_fault((va, root)))?;

        let pml4i = ((va.0 >> 39) & 0x1ff) as usize;
        let pml4e = table[pml4i];

        if !pml4e.present() {
            return Err(VmiError::page_fault((va, root)));
        }

        let buffer = read_page(pml4e.pfn())?;
        let table = <[PageTableEntry]>::ref_from_bytes(&buffer)
            .map_err(|_| VmiError::page_fault((va, root)))?;

        let pdpti = ((va.0 >> 30) & 0x1ff) as usize;
        let pdpte = table[pdpti];

        if !pdpte.present() {
            return Err(VmiError::page_fault((va, root)));
        }

        if pdpte.large() {
            let offset = va.0 & 0x3fff_ffff;
            return Ok(pdpte.pfn().address(Self::PAGE_SHIFT) + offset);
        }

        let buffer = read_page(pdpte.pfn())?;
        let table = <[PageTableEntry]>::ref_from_bytes(&buffer)
            .map_err(|_| VmiError::page_fault((va, root)))?;

        let pdi = ((va.0 >> 21) & 0x1ff) as usize;
        let pde = table[pdi];

        if !pde.present() {
            return Err(VmiError::page_fault((va, root)));
        }

        if pde.large() {
            let offset = va.0 & 0x1f_ffff;
            return Ok(pde.pfn().address(Self::PAGE_SHIFT) + offset);
        }

        let buffer = read_page(pde.pfn())?;
        let table = <[PageTableEntry]>::ref_from_bytes(&buffer)
            .map_err(|_| VmiError::page_fault((va, root)))?;

        let pti = ((va.0 >> 12) & 0x1ff) as usize;
        let pte = table[pti];

        if !pte.present() {
            return Err(VmiError::page_fault((va, root)));
        }

        Ok(pte.pfn().address(Self::PAGE_SHIFT) + (va.0 & 0xfff))
    }

    /// Like [`Self::translate_address`], but additionally records every
    /// page-table entry visited, for diagnostic or recipe use. Always
    /// 4-level (long mode); callers translating legacy/PAE guests should
    /// use [`Self::translate_address`] directly.
    pub fn translation(
        read_page: impl Fn(Pfn) -> Result<VmiMappedPage, VmiError>,
        va: Va,
        root: Pa,
    ) -> VaTranslation {
        let mut entries = TranslationEntries::new();
        let va = Self::va_canonical(va);

        macro_rules! step {
            ($pfn:expr, $level:expr, $index_shift:expr, $index_bits:expr, $parent_addr:expr) => {{
                let buffer = match read_page($pfn) {
                    Ok(buffer) => buffer,
                    Err(_) => return VaTranslation { entries, pa: None },
                };
                let table = match <[PageTableEntry]>::ref_from_bytes(&buffer) {
                    Ok(table) => table,
                    Err(_) => return VaTranslation { entries, pa: None },
                };
                let index = ((va.0 >> $index_shift) & $index_bits) as usize;
                let entry = table[index];

                entries.push(TranslationEntry {
                    level: $level,
                    entry,
                    entry_address: $parent_addr
                        + (index * std::mem::size_of::<PageTableEntry>()) as u64,
                });

                entry
            }};
        }

        let pml4e = step!(
            root.pfn(Self::PAGE_SHIFT),
            PageTableLevel::Pml4,
            39,
            0x1ff,
            root
        );
        if !pml4e.present() {
            return VaTranslation { entries, pa: None };
        }

        let pdpte = step!(
            pml4e.pfn(),
            PageTableLevel::Pdpt,
            30,
            0x1ff,
            pml4e.pfn().address(Self::PAGE_SHIFT)
        );
        if !pdpte.present() {
            return VaTranslation { entries, pa: None };
        }
        if pdpte.large() {
            return VaTranslation {
                entries,
                pa: Some(pdpte.pfn().address(Self::PAGE_SHIFT) + (va.0 & 0x3fff_ffff)),
            };
        }

        let pde = step!(
            pdpte.pfn(),
            PageTableLevel::Pd,
            21,
            0x1ff,
            pdpte.pfn().address(Self::PAGE_SHIFT)
        );
        if !pde.present() {
            return VaTranslation { entries, pa: None };
        }
        if pde.large() {
            return VaTranslation {
                entries,
                pa: Some(pde.pfn().address(Self::PAGE_SHIFT) + (va.0 & 0x1f_ffff)),
            };
        }

        let pte = step!(
            pde.pfn(),
            PageTableLevel::Pt,
            12,
            0x1ff,
            pde.pfn().address(Self::PAGE_SHIFT)
        );
        if !pte.present() {
            return VaTranslation { entries, pa: None };
        }

        VaTranslation {
            entries,
            pa: Some(pte.pfn().address(Self::PAGE_SHIFT) + (va.0 & 0xfff)),
        }
    }
}

impl Registers {
    /// The guest's paging root (`CR3`), as a physical address.
    pub fn translation_root(&self) -> Pa {
        self.cr3.into()
    }

    /// Builds an [`AddressContext`] for `va`, rooted at the current `CR3`.
    pub fn address_context(&self, va: Va) -> AddressContext {
        (va, self.translation_root()).into()
    }

    /// Builds an [`AccessContext`] for `va`, rooted at the current `CR3`.
    pub fn access_context(&self, va: Va) -> AccessContext {
        self.address_context(va).into()
    }

    /// The effective address width of the currently executing code segment:
    /// 4 bytes in compatibility/legacy/PAE mode, 8 bytes in 64-bit mode.
    ///
    /// In IA-32e mode, `CS.L` (bit 21 of the descriptor's access byte,
    /// surfaced here as [`SegmentAccess::long_mode`]) selects between 64-bit
    /// mode and compatibility mode.
    pub fn effective_address_width(&self) -> u64 {
        match Amd64::paging_mode(self) {
            Some(PagingMode::Ia32e | PagingMode::Ia32eLA57) if !self.cs.access.long_mode() => 4,
            Some(mode) => Amd64::address_width(mode),
            None => 0,
        }
    }
}
