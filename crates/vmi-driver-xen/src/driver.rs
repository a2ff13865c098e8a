use std::{cell::RefCell, os::fd::AsRawFd as _};

use vmi_arch_amd64::{Amd64, PagingMode, Registers};
use vmi_core::{
    AccessMode, MemoryAccess, Pa, Pfn, RawEvent, Register, VcpuId, VmiDriver, VmiError, VmiInfo,
    VmiMappedPage,
};
use xen::{
    ctrl::{VmEventReason, VmEventRing},
    XenControl, XenDeviceModel, XenDomain, XenDomainId, XenDomainInfo, XenEventChannelPort,
    XenForeignMemory, XenForeignMemoryProtection, XenMonitor, XenStore,
};

use crate::{
    convert::{FromExt as _, IntoExt as _},
    error::Error,
};

/// VMI driver for the Xen hypervisor, amd64 guests only.
///
/// Drops the altp2m/EPT-view machinery of the upstream Xen tooling: this
/// library only ever programs the default view's access rights.
pub struct XenDriver {
    domain: XenDomain<xen::arch::x86::Amd64>,
    #[allow(dead_code)]
    devicemodel: XenDeviceModel,
    monitor: XenMonitor,
    evtchn: XenEventChannelPort,
    foreign_memory: XenForeignMemory,
    domain_info: XenDomainInfo,
    info: VmiInfo,

    ring: RefCell<VmEventRing>,
}

impl XenDriver {
    /// Resolves a domain name to its numeric id via xenstore.
    pub fn id_from_name(name: &str) -> Result<XenDomainId, Error> {
        XenStore::new()?
            .domain_id_from_name(name)?
            .ok_or(Error::NotFound)
    }

    /// Resolves a numeric domain id back to its xenstore name (the single
    /// read at `/local/domain/<id>/name`, mirroring `id_from_name`'s
    /// directory scan).
    pub fn name_from_id(domain_id: XenDomainId) -> Result<String, Error> {
        XenStore::new()?
            .domain_name_from_id(domain_id)?
            .ok_or(Error::NotFound)
    }

    /// Cheap feasibility check for autodetection: the domain must exist and
    /// be running under this hypervisor.
    pub fn probe(domain_id: XenDomainId) -> Result<(), Error> {
        XenControl::new()?.domain(domain_id)?.info()?;
        Ok(())
    }

    /// Opens the domain and brings up the monitor/foreign-memory handles.
    pub fn new(domain_id: XenDomainId, events: bool) -> Result<Self, Error> {
        let xc = XenControl::new()?;
        let domain = xc.domain(domain_id)?;
        domain.set_max_mem(u64::MAX)?;

        let devicemodel = domain.device_model()?;
        let (monitor, ring) = domain.monitor()?;
        let evtchn = monitor.channel()?;
        let foreign_memory = XenForeignMemory::new()?;
        let domain_info = domain.info()?;

        if events {
            monitor.inguest_pagefault(true)?;
            monitor.emul_unimplemented(true)?;
        }

        // The control library exposes only `hvm`/`max_vcpu_id`/`max_pages`
        // on the domain-info record; there's no separate address-size
        // query for either guest kind here, so both hardware-virt and
        // paravirt domains go through the same path: read vCPU 0's saved
        // CR0/CR4/EFER and derive the paging mode exactly as a live guest
        // would report it through `get_vcpureg`.
        let registers: Registers = domain.get_context_cpu(xen::VcpuId(0))?.into_ext();
        let address_width = Amd64::paging_mode(&registers)
            .map(PagingMode::address_width)
            .and_then(|bytes| vmi_core::AddressWidth::from_bytes(bytes as u64))
            .ok_or(Error::InvalidAddressWidth)?;

        let info = VmiInfo {
            address_width,
            page_size: Amd64::PAGE_SIZE,
            page_shift: Amd64::PAGE_SHIFT,
            memory_size: domain.maximum_gpfn()? << Amd64::PAGE_SHIFT,
            vcpu_count: domain_info.max_vcpu_id as u16 + 1,
            paravirtualized: !domain_info.hvm,
            guest_os_family: vmi_core::GuestOsFamily::None,
            supports_events: true,
        };

        Ok(Self {
            domain,
            devicemodel,
            monitor,
            evtchn,
            foreign_memory,
            domain_info,
            info,
            ring: RefCell::new(ring),
        })
    }

    fn registers(&self, vcpu: VcpuId) -> Result<Registers, Error> {
        Ok(self
            .domain
            .get_context_cpu(vcpu.into_ext())?
            .into_ext())
    }

    fn set_registers(&self, vcpu: VcpuId, registers: Registers) -> Result<(), Error> {
        Ok(self
            .domain
            .set_context_cpu(vcpu.into_ext(), registers.into_ext())?)
    }
}

impl VmiDriver for XenDriver {
    fn info(&self) -> &VmiInfo {
        &self.info
    }

    fn destroy(&mut self) -> Result<(), VmiError> {
        let max_memkb = self.domain_info.max_pages * Amd64::PAGE_SIZE / 1024;

        let _ = self.domain.set_max_mem(max_memkb);
        let _ = self.monitor.emul_unimplemented(false);
        let _ = self.monitor.inguest_pagefault(false);

        Ok(())
    }

    fn map_frame(&self, pfn: Pfn, protection: MemoryAccess) -> Result<VmiMappedPage, VmiError> {
        let prot = if protection.contains(MemoryAccess::W) {
            XenForeignMemoryProtection::READ | XenForeignMemoryProtection::WRITE
        }
        else {
            XenForeignMemoryProtection::READ
        };

        let page = self
            .foreign_memory
            .map(self.domain.id(), prot, &[pfn.0], None)
            .map_err(Error::from)?;

        Ok(VmiMappedPage::new(page))
    }

    fn write(&self, paddr: Pa, buf: &[u8]) -> Result<(), VmiError> {
        let page_size = self.info.page_size;
        let page_mask = page_size - 1;

        let mut remaining = buf;
        let mut addr = paddr.0;

        while !remaining.is_empty() {
            let offset = addr & page_mask;
            let len = std::cmp::min(page_size - offset, remaining.len() as u64) as usize;

            let pfn = Pfn::new(addr >> self.info.page_shift);

            let mut page = self
                .foreign_memory
                .map(
                    self.domain.id(),
                    XenForeignMemoryProtection::READ | XenForeignMemoryProtection::WRITE,
                    &[pfn.0],
                    None,
                )
                .map_err(Error::from)?;

            let offset = offset as usize;
            page[offset..offset + len].copy_from_slice(&remaining[..len]);

            remaining = &remaining[len..];
            addr += len as u64;
        }

        Ok(())
    }

    fn get_vcpureg(&self, reg: Register, vcpu: VcpuId) -> Result<u64, VmiError> {
        if self.info.paravirtualized && !vmi_arch_amd64::is_pv_supported(reg) {
            return Err(VmiError::Unsupported);
        }

        let registers = self.registers(vcpu).map_err(VmiError::from)?;

        vmi_arch_amd64::register_get(&registers, reg).ok_or(VmiError::Unsupported)
    }

    fn set_vcpureg(&self, reg: Register, vcpu: VcpuId, value: u64) -> Result<(), VmiError> {
        if self.info.paravirtualized && !vmi_arch_amd64::is_pv_supported(reg) {
            return Err(VmiError::Unsupported);
        }

        let mut registers = self.registers(vcpu).map_err(VmiError::from)?;

        vmi_arch_amd64::register_set(&mut registers, reg, value).ok_or(VmiError::Unsupported)?;

        self.set_registers(vcpu, registers).map_err(VmiError::from)
    }

    fn pause(&self) -> Result<(), VmiError> {
        self.domain.pause().map_err(Error::from)?;
        Ok(())
    }

    fn resume(&self) -> Result<(), VmiError> {
        self.domain.unpause().map_err(Error::from)?;
        Ok(())
    }

    fn set_reg_access(&self, reg: Register, access: AccessMode) -> Result<(), VmiError> {
        let ctrlreg = match reg {
            Register::Cr0 => xen::ctrl::VmEventCtrlReg::Cr0,
            Register::Cr3 => xen::ctrl::VmEventCtrlReg::Cr3,
            Register::Cr4 => xen::ctrl::VmEventCtrlReg::Cr4,
            _ => return Err(VmiError::Unsupported),
        };

        let enable = !matches!(access, AccessMode::None);

        self.monitor
            .write_ctrlreg(ctrlreg, enable, true, 0, true)
            .map_err(Error::from)?;

        Ok(())
    }

    fn set_mem_access(&self, pfn: Pfn, access: AccessMode) -> Result<(), VmiError> {
        let bits = match access {
            AccessMode::None => MemoryAccess::RWX,
            AccessMode::Mask(mask) => !mask & MemoryAccess::RWX,
            AccessMode::ExecuteOnWrite => MemoryAccess::empty(),
        };

        self.domain
            .set_mem_access(pfn.0, bits.into_ext())
            .map_err(Error::from)?;

        Ok(())
    }

    fn start_single_step(&self, vcpu: VcpuId) -> Result<(), VmiError> {
        self.monitor.singlestep(true).map_err(Error::from)?;
        self.domain
            .debug_control(vcpu.into_ext(), 1)
            .map_err(Error::from)?;
        Ok(())
    }

    fn stop_single_step(&self, vcpu: VcpuId) -> Result<(), VmiError> {
        self.domain
            .debug_control(vcpu.into_ext(), 0)
            .map_err(Error::from)?;
        Ok(())
    }

    fn shutdown_single_step(&self) -> Result<(), VmiError> {
        self.monitor.singlestep(false).map_err(Error::from)?;
        Ok(())
    }

    fn events_listen(&self, timeout_ms: u32) -> Result<Vec<RawEvent>, VmiError> {
        let mut fds = [libc::pollfd {
            fd: self.evtchn.as_raw_fd(),
            events: libc::POLLIN | libc::POLLERR,
            revents: 0,
        }];

        let timeout: i32 = timeout_ms.try_into().map_err(|_| Error::InvalidTimeout)?;

        #[rustfmt::skip]
        let poll_result = unsafe {
            libc::poll(fds.as_mut_ptr() as _, fds.len() as _, timeout)
        };

        match poll_result {
            0 => return Ok(Vec::new()),
            -1 => return Err(Error::Io(std::io::Error::last_os_error()).into()),
            _ => (),
        }

        self.evtchn.wait().map_err(Error::from)?;

        let mut out = Vec::new();

        {
            let mut ring = self.ring.borrow_mut();

            while ring.has_unconsumed_requests() {
                let mut event = ring.get_request();
                let vcpu = VcpuId(event.vcpu_id as u16);

                match &event.reason {
                    VmEventReason::MemoryAccess(mem) => {
                        let pfn = Pfn::new(mem.gfn);
                        out.push(RawEvent::Memory {
                            vcpu,
                            pfn,
                            offset: Some(mem.offset as u16),
                            access: MemoryAccess::from_bits_truncate(mem.flags as u8),
                        });
                    }
                    VmEventReason::WriteCtrlReg(wcr) => {
                        let reg = match wcr.index {
                            xen::ctrl::VmEventCtrlReg::Cr0 => Register::Cr0,
                            xen::ctrl::VmEventCtrlReg::Cr3 => Register::Cr3,
                            xen::ctrl::VmEventCtrlReg::Cr4 => Register::Cr4,
                            _ => continue,
                        };

                        out.push(RawEvent::Register { vcpu, register: reg });
                    }
                    VmEventReason::Singlestep(_) => {
                        out.push(RawEvent::SingleStep { vcpu });
                    }
                    _ => {}
                }

                ring.put_response(event);
            }
        }

        self.evtchn.notify().map_err(Error::from)?;

        Ok(out)
    }
}

impl std::fmt::Debug for XenDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("XenDriver")
            .field("info", &self.info)
            .finish()
    }
}
