use vmi_arch_amd64::Amd64;
use vmi_core::{
    AccessContext, MemoryAccess, Pa, TranslationMechanism, VcpuId, Va, VmiDriver, VmiError,
};

use crate::Vmi;

impl<D> Vmi<D>
where
    D: VmiDriver,
{
    /// Translates a virtual address to a physical address without reading
    /// any data.
    ///
    /// `root` is the paging structure root (e.g. `CR3`); if `None`, the
    /// current value on `vcpu` is used.
    pub fn translate(&self, va: Va, root: Option<Pa>, vcpu: VcpuId) -> Result<Pa, VmiError> {
        let mode = Amd64::paging_mode_of(&self.session, vcpu)?;
        let root = self.resolve_root(root, vcpu)?;

        Amd64::translate_address(
            |pfn| self.session.map_frame(pfn, MemoryAccess::R),
            va,
            root,
            mode,
        )
    }

    /// Reads memory per `access`: a physical address directly, or a virtual
    /// address translated through `access`'s paging root (or `vcpu`'s
    /// current one, if the context leaves it unspecified).
    pub fn read(&self, access: AccessContext, vcpu: VcpuId, buf: &mut [u8]) -> Result<(), VmiError> {
        match access.mechanism {
            TranslationMechanism::Direct => self.session.read_pa(Pa(access.address), buf),
            TranslationMechanism::Paging { root } => {
                let mode = Amd64::paging_mode_of(&self.session, vcpu)?;
                let root = self.resolve_root(root, vcpu)?;
                Amd64::read_va(&self.session, Va(access.address), root, mode, buf)
            }
        }
    }

    /// Writes memory per `access`, analogous to [`Vmi::read`].
    pub fn write(&self, access: AccessContext, vcpu: VcpuId, buf: &[u8]) -> Result<(), VmiError> {
        match access.mechanism {
            TranslationMechanism::Direct => self.session.write_pa(Pa(access.address), buf),
            TranslationMechanism::Paging { root } => {
                let mode = Amd64::paging_mode_of(&self.session, vcpu)?;
                let root = self.resolve_root(root, vcpu)?;
                Amd64::write_va(&self.session, Va(access.address), root, mode, buf)
            }
        }
    }

    fn resolve_root(&self, root: Option<Pa>, vcpu: VcpuId) -> Result<Pa, VmiError> {
        match root {
            Some(root) => Ok(root),
            None => {
                let registers = Amd64::registers_of(&self.session, vcpu)?;
                Ok(registers.translation_root())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use vmi_arch_amd64::{Cr0, Cr3, Cr4, MsrEfer, Registers};
    use vmi_core::{AddressWidth, GuestOsFamily, InitMode, Pfn, Register, VmiInfo, VmiMappedPage};

    use super::*;

    /// A flat, page-indexed driver whose vCPU 0 has a fixed, already-paging
    /// register set, used to exercise translate/read/write end to end.
    struct FlatDriver {
        pages: RefCell<Vec<u8>>,
        registers: Registers,
        info: VmiInfo,
    }

    impl FlatDriver {
        fn new(page_count: u64, root: Pa) -> Self {
            let mut registers = Registers::default();
            registers.cr0 = Cr0(1 << 31); // PG
            registers.cr4 = Cr4(1 << 5); // PAE
            registers.msr_efer = MsrEfer((1 << 8) | (1 << 10)); // LME | LMA
            registers.cr3 = Cr3::from(root.0);

            Self {
                pages: RefCell::new(vec![0u8; (page_count * Amd64::PAGE_SIZE) as usize]),
                registers,
                info: VmiInfo {
                    address_width: AddressWidth::Width8,
                    page_size: Amd64::PAGE_SIZE,
                    page_shift: Amd64::PAGE_SHIFT,
                    memory_size: page_count * Amd64::PAGE_SIZE,
                    vcpu_count: 1,
                    paravirtualized: false,
                    guest_os_family: GuestOsFamily::None,
                    supports_events: false,
                },
            }
        }

        fn write_u64(&self, pa: Pa, value: u64) {
            let offset = pa.0 as usize;
            self.pages.borrow_mut()[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        }

        /// Maps `va` to `PFN(target_pfn)` through a fresh 4-level identity
        /// hierarchy rooted at `root`; page tables occupy the 4 PFNs starting
        /// at `root`.
        fn identity_map(&self, root: Pa, va: Va, target_pfn: u64) {
            let pte = |pfn: u64| (pfn << 12) | 0b11;
            let base = root.0 / Amd64::PAGE_SIZE;

            let pml4i = (va.0 >> 39) & 0x1ff;
            let pdpti = (va.0 >> 30) & 0x1ff;
            let pdi = (va.0 >> 21) & 0x1ff;
            let pti = (va.0 >> 12) & 0x1ff;

            self.write_u64(Pa((base) * Amd64::PAGE_SIZE + pml4i * 8), pte(base + 1));
            self.write_u64(Pa((base + 1) * Amd64::PAGE_SIZE + pdpti * 8), pte(base + 2));
            self.write_u64(Pa((base + 2) * Amd64::PAGE_SIZE + pdi * 8), pte(base + 3));
            self.write_u64(Pa((base + 3) * Amd64::PAGE_SIZE + pti * 8), pte(target_pfn));
        }
    }

    impl VmiDriver for FlatDriver {
        fn info(&self) -> &VmiInfo {
            &self.info
        }

        fn destroy(&mut self) -> Result<(), VmiError> {
            Ok(())
        }

        fn map_frame(&self, pfn: Pfn, _protection: MemoryAccess) -> Result<VmiMappedPage, VmiError> {
            let start = (pfn.0 * Amd64::PAGE_SIZE) as usize;
            let end = start + Amd64::PAGE_SIZE as usize;
            Ok(VmiMappedPage::new(self.pages.borrow()[start..end].to_vec()))
        }

        fn write(&self, pa: Pa, buf: &[u8]) -> Result<(), VmiError> {
            let start = pa.0 as usize;
            self.pages.borrow_mut()[start..start + buf.len()].copy_from_slice(buf);
            Ok(())
        }

        fn get_vcpureg(&self, reg: Register, _vcpu: VcpuId) -> Result<u64, VmiError> {
            vmi_arch_amd64::register_get(&self.registers, reg).ok_or(VmiError::Unsupported)
        }

        fn set_vcpureg(&self, _reg: Register, _vcpu: VcpuId, _value: u64) -> Result<(), VmiError> {
            Err(VmiError::Unsupported)
        }

        fn pause(&self) -> Result<(), VmiError> {
            Ok(())
        }

        fn resume(&self) -> Result<(), VmiError> {
            Ok(())
        }
    }

    #[test]
    fn translate_resolves_current_root_when_unspecified() {
        let root = Pa(0);
        let driver = FlatDriver::new(8, root);
        driver.identity_map(root, Va(0x1000), 4);

        let vmi = Vmi::new(driver, InitMode::PARTIAL).unwrap();

        let pa = vmi.translate(Va(0x1000), None, VcpuId(0)).unwrap();
        assert_eq!(pa, Pa(4 * Amd64::PAGE_SIZE));
    }

    #[test]
    fn read_direct_bypasses_translation() {
        let root = Pa(0);
        let driver = FlatDriver::new(8, root);
        driver.write_u64(Pa(5 * Amd64::PAGE_SIZE), 0x1122_3344_5566_7788);

        let vmi = Vmi::new(driver, InitMode::PARTIAL).unwrap();

        let mut out = [0u8; 8];
        vmi.read(AccessContext::direct(Pa(5 * Amd64::PAGE_SIZE)), VcpuId(0), &mut out)
            .unwrap();
        assert_eq!(out, 0x1122_3344_5566_7788u64.to_le_bytes());
    }

    #[test]
    fn write_then_read_virtual_round_trips() {
        let root = Pa(0);
        let driver = FlatDriver::new(8, root);
        driver.identity_map(root, Va(0x2000), 4);

        let vmi = Vmi::new(driver, InitMode::PARTIAL).unwrap();

        vmi.write(AccessContext::paging(Va(0x2000), root), VcpuId(0), &[0xab; 16])
            .unwrap();

        let mut out = [0u8; 16];
        vmi.read(AccessContext::paging(Va(0x2000), root), VcpuId(0), &mut out)
            .unwrap();
        assert_eq!(out, [0xab; 16]);
    }

    #[test]
    fn read_unmapped_virtual_address_fails() {
        let root = Pa(0);
        let driver = FlatDriver::new(8, root);

        let vmi = Vmi::new(driver, InitMode::PARTIAL).unwrap();

        let mut out = [0u8; 8];
        let err = vmi
            .read(AccessContext::paging(Va(0x3000), root), VcpuId(0), &mut out)
            .unwrap_err();
        assert!(matches!(err, VmiError::Translation(_)));
    }
}
