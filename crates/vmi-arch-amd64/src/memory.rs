//! Virtual-memory convenience wrappers on top of [`VmiSession`], built from
//! the physical-memory primitives it already exposes plus this crate's
//! page-table walk.

use vmi_core::{MemoryAccess, Pa, Va, VcpuId, VmiDriver, VmiError, VmiSession};

use crate::{Amd64, PagingMode, Registers};

impl Amd64 {
    /// Determines the current paging mode of `vcpu` by fetching its
    /// control/EFER registers.
    pub fn paging_mode_of<D>(session: &VmiSession<D>, vcpu: VcpuId) -> Result<PagingMode, VmiError>
    where
        D: VmiDriver,
    {
        let mut registers = Registers::default();
        registers.cr0 = session.get_vcpureg(vmi_core::Register::Cr0, vcpu)?.into();
        registers.cr4 = session.get_vcpureg(vmi_core::Register::Cr4, vcpu)?.into();
        registers.msr_efer = session.get_vcpureg(vmi_core::Register::MsrEfer, vcpu)?.into();

        Self::paging_mode(&registers).ok_or(VmiError::RootNotPresent)
    }

    /// Fetches the subset of `vcpu`'s registers needed to determine its
    /// paging mode, translation root, and syscall entry point.
    ///
    /// This is not a full register dump: every other field of the returned
    /// [`Registers`] is left at its zero default. Callers such as guest OS
    /// detection only ever read `cr0`, `cr4`, `msr_efer`, `cr3`, and
    /// `msr_lstar`, and fetching just those five keeps this portable across
    /// backends that can't cheaply produce a complete context.
    pub fn registers_of<D>(session: &VmiSession<D>, vcpu: VcpuId) -> Result<Registers, VmiError>
    where
        D: VmiDriver,
    {
        let mut registers = Registers::default();
        registers.cr0 = session.get_vcpureg(vmi_core::Register::Cr0, vcpu)?.into();
        registers.cr4 = session.get_vcpureg(vmi_core::Register::Cr4, vcpu)?.into();
        registers.msr_efer = session.get_vcpureg(vmi_core::Register::MsrEfer, vcpu)?.into();
        registers.cr3 = session.get_vcpureg(vmi_core::Register::Cr3, vcpu)?.into();
        registers.msr_lstar = session.get_vcpureg(vmi_core::Register::MsrLstar, vcpu)?;

        Ok(registers)
    }

    /// Reads `buf.len()` bytes starting at the virtual address `va`,
    /// translated through the paging structures rooted at `root`.
    ///
    /// Like [`VmiSession::read_pa`], this may span multiple pages; each page
    /// is translated and mapped independently, so a fault partway through
    /// leaves `buf` partially filled.
    pub fn read_va<D>(
        session: &VmiSession<D>,
        va: Va,
        root: Pa,
        mode: PagingMode,
        buf: &mut [u8],
    ) -> Result<(), VmiError>
    where
        D: VmiDriver,
    {
        let mut remaining = buf.len();
        let mut written = 0usize;
        let mut addr = va;

        while remaining > 0 {
            let page_offset = (addr.0 & (Self::PAGE_SIZE - 1)) as usize;
            let chunk = remaining.min(Self::PAGE_SIZE as usize - page_offset);

            let pa = Self::translate_address(
                |pfn| session.map_frame(pfn, MemoryAccess::R),
                addr,
                root,
                mode,
            )?;

            session.read_pa(pa, &mut buf[written..written + chunk])?;

            written += chunk;
            remaining -= chunk;
            addr = Va(addr.0 + chunk as u64);
        }

        Ok(())
    }

    /// Writes `buf` starting at the virtual address `va`, translated through
    /// the paging structures rooted at `root`.
    pub fn write_va<D>(
        session: &VmiSession<D>,
        va: Va,
        root: Pa,
        mode: PagingMode,
        buf: &[u8],
    ) -> Result<(), VmiError>
    where
        D: VmiDriver,
    {
        let mut remaining = buf.len();
        let mut read = 0usize;
        let mut addr = va;

        while remaining > 0 {
            let page_offset = (addr.0 & (Self::PAGE_SIZE - 1)) as usize;
            let chunk = remaining.min(Self::PAGE_SIZE as usize - page_offset);

            let pa = Self::translate_address(
                |pfn| session.map_frame(pfn, MemoryAccess::R),
                addr,
                root,
                mode,
            )?;

            session.write_pa(pa, &buf[read..read + chunk])?;

            read += chunk;
            remaining -= chunk;
            addr = Va(addr.0 + chunk as u64);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use vmi_core::{AddressWidth, GuestOsFamily, Pfn, Register, VmiInfo, VmiMappedPage};

    use super::*;

    /// A driver backed by a flat `Vec<u8>`, page-indexed, with no event
    /// plane. Good enough to exercise the walk without a real backend.
    struct FlatDriver {
        pages: RefCell<Vec<u8>>,
        info: VmiInfo,
    }

    impl FlatDriver {
        fn new(page_count: u64) -> Self {
            Self {
                pages: RefCell::new(vec![0u8; (page_count * Amd64::PAGE_SIZE) as usize]),
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

        fn get_vcpureg(&self, _reg: Register, _vcpu: VcpuId) -> Result<u64, VmiError> {
            Err(VmiError::Unsupported)
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

    /// Maps `va` to `PFN(target_pfn)` through a fresh 4-level identity
    /// hierarchy rooted at `PFN(0)`; page tables occupy PFNs 0..=3, leaving
    /// PFN 4 onward free for data.
    fn identity_map(driver: &FlatDriver, va: Va, target_pfn: u64) -> Pa {
        let pte = |pfn: u64| (pfn << 12) | 0b11;

        let pml4i = (va.0 >> 39) & 0x1ff;
        let pdpti = (va.0 >> 30) & 0x1ff;
        let pdi = (va.0 >> 21) & 0x1ff;
        let pti = (va.0 >> 12) & 0x1ff;

        driver.write_u64(Pa(0 * Amd64::PAGE_SIZE + pml4i * 8), pte(1));
        driver.write_u64(Pa(1 * Amd64::PAGE_SIZE + pdpti * 8), pte(2));
        driver.write_u64(Pa(2 * Amd64::PAGE_SIZE + pdi * 8), pte(3));
        driver.write_u64(Pa(3 * Amd64::PAGE_SIZE + pti * 8), pte(target_pfn));

        Pa(0)
    }

    #[test]
    fn read_va_crosses_page_boundary() {
        let driver = FlatDriver::new(8);
        let va = Va(0x1000 - 4);

        let root = identity_map(&driver, va, 4);
        identity_map(&driver, Va(va.0 + Amd64::PAGE_SIZE), 5);

        let session = VmiSession::new(driver);

        let payload = 0x1122_3344_5566_7788u64.to_le_bytes();
        session.write_pa(Pa(4 * Amd64::PAGE_SIZE + 0xffc), &payload[..4]).unwrap();
        session.write_pa(Pa(5 * Amd64::PAGE_SIZE), &payload[4..]).unwrap();

        let mut out = [0u8; 8];
        Amd64::read_va(&session, va, root, PagingMode::Ia32e, &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn read_va_unmapped_page_faults() {
        let driver = FlatDriver::new(8);
        let root = Pa(0);
        let session = VmiSession::new(driver);

        let mut out = [0u8; 8];
        let err = Amd64::read_va(&session, Va(0x1000), root, PagingMode::Ia32e, &mut out).unwrap_err();
        assert!(matches!(err, VmiError::Translation(_)));
    }

    #[test]
    fn write_va_round_trips() {
        let driver = FlatDriver::new(8);
        let va = Va(0x2000);
        let root = identity_map(&driver, va, 4);
        let session = VmiSession::new(driver);

        Amd64::write_va(&session, va, root, PagingMode::Ia32e, &[0xab; 16]).unwrap();

        let mut out = [0u8; 16];
        Amd64::read_va(&session, va, root, PagingMode::Ia32e, &mut out).unwrap();
        assert_eq!(out, [0xab; 16]);
    }
}
