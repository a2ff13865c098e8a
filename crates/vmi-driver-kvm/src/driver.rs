use std::{cell::RefCell, net::ToSocketAddrs};

use vmi_arch_amd64::Amd64;
use vmi_core::{
    AddressWidth, GuestOsFamily, MemoryAccess, Pa, Pfn, Register, VcpuId, VmiDriver, VmiError,
    VmiInfo, VmiMappedPage,
};

use crate::{error::Error, gdb::GdbClient, monitor_text, qmp::QmpClient, registers};

/// VMI driver for a KVM guest, reached through QEMU's monitor and GDB
/// stub.
///
/// There is no hypervisor event plane here comparable to Xen's
/// `vm_event`: register/memory-access monitoring and single-step all stay
/// at the [`VmiDriver`] trait's default `Unsupported`, same as the
/// snapshot backend.
pub struct KvmDriver {
    qmp: RefCell<QmpClient>,
    gdb: RefCell<GdbClient>,
    info: VmiInfo,
}

impl KvmDriver {
    /// Connects to QEMU's QMP socket and GDB stub.
    ///
    /// Probes for a patched fast memory-access monitor command first; if
    /// the running QEMU doesn't have one (the common case, since it is not
    /// part of upstream QEMU), every memory access falls back to the GDB
    /// stub's `m`/`M` packets for the remainder of the session.
    pub fn new(qmp_addr: impl ToSocketAddrs, gdb_addr: impl ToSocketAddrs) -> Result<Self, Error> {
        let mut qmp = QmpClient::connect(qmp_addr)?;
        let gdb = GdbClient::connect(gdb_addr)?;

        match qmp.human_monitor_command("pmemaccess") {
            Ok(_) => tracing::debug!("patched memory-access monitor command available"),
            Err(error) => {
                tracing::debug!(%error, "no patched memory-access command; using GDB stub for memory")
            }
        }

        let vcpu_count = qmp.vcpu_count()?;
        let memory_size = qmp.memory_size()?;

        let info = VmiInfo {
            address_width: AddressWidth::Width8,
            page_size: Amd64::PAGE_SIZE,
            page_shift: Amd64::PAGE_SHIFT,
            memory_size,
            vcpu_count,
            paravirtualized: false,
            guest_os_family: GuestOsFamily::None,
            supports_events: false,
        };

        Ok(Self { qmp: RefCell::new(qmp), gdb: RefCell::new(gdb), info })
    }

    /// Reads `CR0`/`CR2`/`CR3`/`CR4` out of `info registers` monitor text,
    /// the only path to the control registers this backend has (the GDB
    /// stub's `g` packet does not carry them).
    ///
    /// Only reflects the vCPU the monitor currently considers "current";
    /// unlike register access through the GDB stub, there is no per-vCPU
    /// selection for this path.
    fn control_register(&self, reg: Register) -> Result<u64, VmiError> {
        use Register::*;

        if !matches!(reg, Cr0 | Cr2 | Cr3 | Cr4) {
            return Err(VmiError::Unsupported);
        }

        let text = self.qmp.borrow_mut().human_monitor_command("info registers")?;
        let regs = monitor_text::parse_control_registers(&text);

        let value = match reg {
            Cr0 => regs.cr0,
            Cr2 => regs.cr2,
            Cr3 => regs.cr3,
            Cr4 => regs.cr4,
            _ => unreachable!(),
        };

        value.ok_or(VmiError::Unsupported)
    }
}

impl VmiDriver for KvmDriver {
    fn info(&self) -> &VmiInfo {
        &self.info
    }

    fn destroy(&mut self) -> Result<(), VmiError> {
        Ok(())
    }

    fn map_frame(&self, pfn: Pfn, _protection: MemoryAccess) -> Result<VmiMappedPage, VmiError> {
        let addr = pfn.address(Amd64::PAGE_SHIFT).0;
        let data = self.gdb.borrow_mut().read_memory(addr, Amd64::PAGE_SIZE as usize)?;
        Ok(VmiMappedPage::new(data))
    }

    fn write(&self, paddr: Pa, buf: &[u8]) -> Result<(), VmiError> {
        self.gdb.borrow_mut().write_memory(paddr.0, buf)?;
        Ok(())
    }

    fn get_vcpureg(&self, reg: Register, vcpu: VcpuId) -> Result<u64, VmiError> {
        let mut gdb = self.gdb.borrow_mut();
        gdb.select_thread(vcpu.0 as u64 + 1)?;
        let blob = gdb.read_general_registers()?;

        if let Some(value) = registers::get(&blob, reg) {
            return Ok(value);
        }

        drop(gdb);
        self.control_register(reg)
    }

    fn set_vcpureg(&self, reg: Register, vcpu: VcpuId, value: u64) -> Result<(), VmiError> {
        let mut gdb = self.gdb.borrow_mut();
        gdb.select_thread(vcpu.0 as u64 + 1)?;
        let mut blob = gdb.read_general_registers()?;

        if registers::set(&mut blob, reg, value).is_none() {
            return Err(VmiError::Unsupported);
        }

        gdb.write_general_registers(&blob)?;
        Ok(())
    }

    fn pause(&self) -> Result<(), VmiError> {
        self.qmp.borrow_mut().stop()?;
        Ok(())
    }

    fn resume(&self) -> Result<(), VmiError> {
        self.qmp.borrow_mut().cont()?;
        Ok(())
    }
}

impl std::fmt::Debug for KvmDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("KvmDriver").field("info", &self.info).finish_non_exhaustive()
    }
}
