use indexmap::IndexMap;

use crate::{
    AccessMode, MemoryAccess, Pfn, Register, VcpuId, VmiDriver, VmiError,
    driver::RawEvent,
};

/// Callback invoked when a monitored memory access occurs.
pub type MemoryEventCallback = Box<dyn FnMut(VcpuId, Pfn, Option<u16>, MemoryAccess)>;

/// Callback invoked when a monitored register is accessed.
pub type RegisterEventCallback = Box<dyn FnMut(VcpuId, Register)>;

/// Callback invoked when a vCPU completes a single-stepped instruction.
pub type SingleStepEventCallback = Box<dyn FnMut(VcpuId)>;

struct MemEvent {
    access: AccessMode,
    callback: MemoryEventCallback,
}

/// A registration request for a memory event, at either page or byte
/// granularity.
pub enum MemEventTarget {
    /// Monitor the whole page.
    Page,

    /// Monitor a single byte at the given offset within the page.
    Byte(u16),
}

struct PageDescriptor {
    /// The access mask currently programmed in the hypervisor for this
    /// page; always the combination of `page_event` and every entry in
    /// `byte_events`.
    mask: AccessMode,
    page_event: Option<MemEvent>,
    byte_events: IndexMap<u16, MemEvent>,
}

impl PageDescriptor {
    fn is_empty(&self) -> bool {
        self.page_event.is_none() && self.byte_events.is_empty()
    }

    /// Recomputes the combination over every *remaining* registration,
    /// excluding none.
    fn recombine(&self) -> Result<AccessMode, crate::Invalid> {
        let mut mask = AccessMode::None;
        if let Some(ref e) = self.page_event {
            mask = mask.combine(e.access)?;
        }
        for e in self.byte_events.values() {
            mask = mask.combine(e.access)?;
        }
        Ok(mask)
    }
}

struct RegEvent {
    access: AccessMode,
    callback: RegisterEventCallback,
}

struct SingleStepEvent {
    callback: SingleStepEventCallback,
}

/// The event registry: per-page/byte memory registrations, per-register
/// registrations, and per-vCPU single-step registrations, plus the access
/// combiner that keeps the hypervisor's programmed mask consistent with
/// them.
#[derive(Default)]
pub struct EventRegistry {
    mem_events: IndexMap<Pfn, PageDescriptor>,
    reg_events: IndexMap<Register, RegEvent>,
    ss_events: IndexMap<VcpuId, SingleStepEvent>,
    shutting_down: bool,
}

impl EventRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a memory event on the page containing `pfn`.
    pub fn register_mem_event(
        &mut self,
        driver: &impl VmiDriver,
        pfn: Pfn,
        target: MemEventTarget,
        access: AccessMode,
        callback: MemoryEventCallback,
    ) -> Result<(), VmiError> {
        let event = MemEvent { access, callback };

        match self.mem_events.get_mut(&pfn) {
            None => {
                driver.set_mem_access(pfn, access)?;

                let mut descriptor = PageDescriptor {
                    mask: access,
                    page_event: None,
                    byte_events: IndexMap::new(),
                };

                match target {
                    MemEventTarget::Page => descriptor.page_event = Some(event),
                    MemEventTarget::Byte(offset) => {
                        descriptor.byte_events.insert(offset, event);
                    }
                }

                self.mem_events.insert(pfn, descriptor);
                Ok(())
            }
            Some(descriptor) => {
                let new_mask = descriptor.mask.combine(access)?;

                match target {
                    MemEventTarget::Page => {
                        if descriptor.page_event.is_some() {
                            return Err(VmiError::Conflict);
                        }
                        driver.set_mem_access(pfn, new_mask)?;
                        descriptor.page_event = Some(event);
                        descriptor.mask = new_mask;
                    }
                    MemEventTarget::Byte(offset) => {
                        if descriptor.byte_events.contains_key(&offset) {
                            return Err(VmiError::Conflict);
                        }
                        driver.set_mem_access(pfn, new_mask)?;
                        descriptor.byte_events.insert(offset, event);
                        descriptor.mask = new_mask;
                    }
                }

                Ok(())
            }
        }
    }

    /// Clears a previously registered memory event.
    pub fn clear_mem_event(
        &mut self,
        driver: &impl VmiDriver,
        pfn: Pfn,
        target: MemEventTarget,
    ) -> Result<(), VmiError> {
        let Some(descriptor) = self.mem_events.get_mut(&pfn)
        else {
            return Err(VmiError::NotFound);
        };

        // Temporarily remove the entry being cleared so `recombine` sees
        // only the remaining registrations.
        let removed = match target {
            MemEventTarget::Page => descriptor.page_event.take().map(|e| (None, e)),
            MemEventTarget::Byte(offset) => descriptor
                .byte_events
                .remove(&offset)
                .map(|e| (Some(offset), e)),
        };

        let Some((offset, removed)) = removed
        else {
            return Err(VmiError::NotFound);
        };

        let new_mask = match descriptor.recombine() {
            Ok(mask) => mask,
            Err(_) => {
                Self::reinsert(descriptor, offset, removed);
                return Err(VmiError::Conflict);
            }
        };

        match driver.set_mem_access(pfn, new_mask) {
            Ok(()) => {
                descriptor.mask = new_mask;

                if descriptor.is_empty() && !self.shutting_down {
                    self.mem_events.remove(&pfn);
                }

                Ok(())
            }
            Err(err) => {
                // Backend failure: put the removed entry back so the
                // descriptor stays consistent with the hypervisor's
                // still-unchanged programmed mask.
                Self::reinsert(descriptor, offset, removed);
                Err(err)
            }
        }
    }

    fn reinsert(descriptor: &mut PageDescriptor, offset: Option<u16>, event: MemEvent) {
        match offset {
            None => descriptor.page_event = Some(event),
            Some(offset) => {
                descriptor.byte_events.insert(offset, event);
            }
        }
    }

    /// Registers a register event.
    pub fn register_reg_event(
        &mut self,
        driver: &impl VmiDriver,
        reg: Register,
        access: AccessMode,
        callback: RegisterEventCallback,
    ) -> Result<(), VmiError> {
        if self.reg_events.contains_key(&reg) {
            return Err(VmiError::Conflict);
        }

        driver.set_reg_access(reg, access)?;
        self.reg_events.insert(reg, RegEvent { access, callback });
        Ok(())
    }

    /// Clears a register event. Momentarily sets the backend's access to
    /// [`AccessMode::None`], then restores it to the registration's
    /// original access before removing the entry, so the hypervisor
    /// observes the same sequence of states whether or not the clear
    /// ultimately succeeds.
    pub fn clear_reg_event(&mut self, driver: &impl VmiDriver, reg: Register) -> Result<(), VmiError> {
        let Some(entry) = self.reg_events.get(&reg)
        else {
            return Err(VmiError::NotFound);
        };

        let access = entry.access;
        driver.set_reg_access(reg, AccessMode::None)?;
        driver.set_reg_access(reg, access)?;

        if !self.shutting_down {
            self.reg_events.remove(&reg);
        }

        Ok(())
    }

    /// Registers single-step monitoring on every vCPU selected by `vcpus`
    /// that is not already registered.
    pub fn register_single_step(
        &mut self,
        driver: &impl VmiDriver,
        vcpus: &[VcpuId],
        callback: SingleStepEventCallback,
    ) -> Result<(), VmiError> {
        // The callback is shared by every vCPU targeted by this
        // registration; clone the trait object via a shared slot instead of
        // requiring `Clone` on `FnMut` by wrapping once up front.
        let shared = std::rc::Rc::new(std::cell::RefCell::new(callback));

        for &vcpu in vcpus {
            if self.ss_events.contains_key(&vcpu) {
                continue;
            }

            driver.start_single_step(vcpu)?;

            let shared = shared.clone();
            self.ss_events.insert(
                vcpu,
                SingleStepEvent {
                    callback: Box::new(move |v| (shared.borrow_mut())(v)),
                },
            );
        }

        Ok(())
    }

    /// Stops and removes the single-step registration for `vcpu`.
    pub fn clear_single_step(&mut self, driver: &impl VmiDriver, vcpu: VcpuId) -> Result<(), VmiError> {
        if !self.ss_events.contains_key(&vcpu) {
            return Err(VmiError::NotFound);
        }

        driver.stop_single_step(vcpu)?;

        if !self.shutting_down {
            self.ss_events.remove(&vcpu);
        }

        Ok(())
    }

    /// Polls the backend for pending events and dispatches each to its
    /// matching registration. Unmatched events (e.g. a straggler delivered
    /// right after a registration was cleared) are silently dropped.
    pub fn listen(&mut self, driver: &impl VmiDriver, timeout_ms: u32) -> Result<(), VmiError> {
        for event in driver.events_listen(timeout_ms)? {
            match event {
                RawEvent::Memory {
                    vcpu,
                    pfn,
                    offset,
                    access,
                } => {
                    let Some(descriptor) = self.mem_events.get_mut(&pfn)
                    else {
                        continue;
                    };

                    // Byte-granularity takes precedence over page-granularity
                    // on a hit in both.
                    if let Some(offset) = offset {
                        if let Some(e) = descriptor.byte_events.get_mut(&offset) {
                            (e.callback)(vcpu, pfn, Some(offset), access);
                            continue;
                        }
                    }

                    if let Some(e) = descriptor.page_event.as_mut() {
                        (e.callback)(vcpu, pfn, offset, access);
                    }
                }
                RawEvent::Register { vcpu, register } => {
                    if let Some(e) = self.reg_events.get_mut(&register) {
                        (e.callback)(vcpu, register);
                    }
                }
                RawEvent::SingleStep { vcpu } => {
                    if let Some(e) = self.ss_events.get_mut(&vcpu) {
                        (e.callback)(vcpu);
                    }
                }
            }
        }

        Ok(())
    }

    /// Walks every table, clearing each entry so the hypervisor is
    /// returned to its default access even if the caller forgot to clear
    /// events. Idempotent: after the first call, the tables are empty.
    pub fn teardown(&mut self, driver: &impl VmiDriver) {
        self.shutting_down = true;

        let pfns: Vec<Pfn> = self.mem_events.keys().copied().collect();
        for pfn in pfns {
            if let Some(descriptor) = self.mem_events.get(&pfn) {
                let has_page = descriptor.page_event.is_some();
                let offsets: Vec<u16> = descriptor.byte_events.keys().copied().collect();

                if has_page {
                    let _ = self.clear_mem_event(driver, pfn, MemEventTarget::Page);
                }
                for offset in offsets {
                    let _ = self.clear_mem_event(driver, pfn, MemEventTarget::Byte(offset));
                }
            }
        }
        self.mem_events.clear();

        let regs: Vec<Register> = self.reg_events.keys().copied().collect();
        for reg in regs {
            let _ = self.clear_reg_event(driver, reg);
        }
        self.reg_events.clear();

        let vcpus: Vec<VcpuId> = self.ss_events.keys().copied().collect();
        for vcpu in vcpus {
            let _ = self.clear_single_step(driver, vcpu);
        }
        self.ss_events.clear();

        self.shutting_down = false;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::{AddressWidth, GuestOsFamily, Pa, VmiInfo, VmiMappedPage};

    /// A driver stub that records every `set_mem_access`/`set_reg_access`
    /// call instead of talking to a hypervisor, and can be told to fail its
    /// next memory-access call to exercise the registry's rollback paths.
    struct FakeDriver {
        info: VmiInfo,
        mem_access: RefCell<HashMap<Pfn, AccessMode>>,
        fail_next_mem_access: RefCell<bool>,
    }

    impl FakeDriver {
        fn new() -> Self {
            Self {
                info: VmiInfo {
                    address_width: AddressWidth::Width8,
                    page_size: 0x1000,
                    page_shift: 12,
                    memory_size: 0,
                    vcpu_count: 4,
                    paravirtualized: false,
                    guest_os_family: GuestOsFamily::None,
                    supports_events: true,
                },
                mem_access: RefCell::new(HashMap::new()),
                fail_next_mem_access: RefCell::new(false),
            }
        }

        fn mem_access_of(&self, pfn: Pfn) -> Option<AccessMode> {
            self.mem_access.borrow().get(&pfn).copied()
        }

        fn fail_next_mem_access(&self) {
            *self.fail_next_mem_access.borrow_mut() = true;
        }
    }

    impl VmiDriver for FakeDriver {
        fn info(&self) -> &VmiInfo {
            &self.info
        }

        fn destroy(&mut self) -> Result<(), VmiError> {
            Ok(())
        }

        fn map_frame(&self, _pfn: Pfn, _protection: MemoryAccess) -> Result<VmiMappedPage, VmiError> {
            Err(VmiError::Unsupported)
        }

        fn write(&self, _paddr: Pa, _buf: &[u8]) -> Result<(), VmiError> {
            Err(VmiError::Unsupported)
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

        fn set_reg_access(&self, _reg: Register, _access: AccessMode) -> Result<(), VmiError> {
            Ok(())
        }

        fn set_mem_access(&self, pfn: Pfn, access: AccessMode) -> Result<(), VmiError> {
            if *self.fail_next_mem_access.borrow() {
                *self.fail_next_mem_access.borrow_mut() = false;
                return Err(VmiError::AccessFailure(Box::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "forced failure for test",
                ))));
            }

            self.mem_access.borrow_mut().insert(pfn, access);
            Ok(())
        }

        fn start_single_step(&self, _vcpu: VcpuId) -> Result<(), VmiError> {
            Ok(())
        }

        fn stop_single_step(&self, _vcpu: VcpuId) -> Result<(), VmiError> {
            Ok(())
        }
    }

    fn no_op_mem_callback() -> MemoryEventCallback {
        Box::new(|_, _, _, _| {})
    }

    fn no_op_reg_callback() -> RegisterEventCallback {
        Box::new(|_, _| {})
    }

    #[test]
    fn descriptor_mask_matches_combined_page_and_byte_events() {
        let driver = FakeDriver::new();
        let mut registry = EventRegistry::new();
        let pfn = Pfn::new(5);

        registry
            .register_mem_event(
                &driver,
                pfn,
                MemEventTarget::Byte(0x10),
                AccessMode::Mask(MemoryAccess::R),
                no_op_mem_callback(),
            )
            .unwrap();
        registry
            .register_mem_event(
                &driver,
                pfn,
                MemEventTarget::Byte(0x20),
                AccessMode::Mask(MemoryAccess::W),
                no_op_mem_callback(),
            )
            .unwrap();

        let descriptor = registry.mem_events.get(&pfn).unwrap();
        assert_eq!(descriptor.mask, AccessMode::Mask(MemoryAccess::RW));
        assert_eq!(descriptor.recombine().unwrap(), descriptor.mask);
        assert_eq!(
            driver.mem_access_of(pfn),
            Some(AccessMode::Mask(MemoryAccess::RW))
        );
    }

    #[test]
    fn byte_events_combine_and_clear_down_to_empty() {
        let driver = FakeDriver::new();
        let mut registry = EventRegistry::new();
        let pfn = Pfn::new(7);

        registry
            .register_mem_event(
                &driver,
                pfn,
                MemEventTarget::Byte(0x10),
                AccessMode::Mask(MemoryAccess::R),
                no_op_mem_callback(),
            )
            .unwrap();
        assert_eq!(
            driver.mem_access_of(pfn),
            Some(AccessMode::Mask(MemoryAccess::R))
        );

        registry
            .register_mem_event(
                &driver,
                pfn,
                MemEventTarget::Byte(0x20),
                AccessMode::Mask(MemoryAccess::W),
                no_op_mem_callback(),
            )
            .unwrap();
        assert_eq!(
            driver.mem_access_of(pfn),
            Some(AccessMode::Mask(MemoryAccess::RW))
        );

        registry
            .clear_mem_event(&driver, pfn, MemEventTarget::Byte(0x10))
            .unwrap();
        assert_eq!(
            driver.mem_access_of(pfn),
            Some(AccessMode::Mask(MemoryAccess::W))
        );

        registry
            .clear_mem_event(&driver, pfn, MemEventTarget::Byte(0x20))
            .unwrap();
        assert!(!registry.mem_events.contains_key(&pfn));
    }

    #[test]
    fn execute_on_write_conflicts_with_an_existing_byte_event() {
        let driver = FakeDriver::new();
        let mut registry = EventRegistry::new();
        let pfn = Pfn::new(9);

        registry
            .register_mem_event(
                &driver,
                pfn,
                MemEventTarget::Byte(0x10),
                AccessMode::Mask(MemoryAccess::R),
                no_op_mem_callback(),
            )
            .unwrap();

        let err = registry
            .register_mem_event(
                &driver,
                pfn,
                MemEventTarget::Page,
                AccessMode::ExecuteOnWrite,
                no_op_mem_callback(),
            )
            .unwrap_err();
        assert!(matches!(err, VmiError::Conflict));

        let descriptor = registry.mem_events.get(&pfn).unwrap();
        assert!(descriptor.page_event.is_none());
        assert_eq!(descriptor.mask, AccessMode::Mask(MemoryAccess::R));
        assert_eq!(
            driver.mem_access_of(pfn),
            Some(AccessMode::Mask(MemoryAccess::R))
        );
    }

    #[test]
    fn clear_reinserts_the_entry_on_backend_failure() {
        let driver = FakeDriver::new();
        let mut registry = EventRegistry::new();
        let pfn = Pfn::new(11);

        registry
            .register_mem_event(
                &driver,
                pfn,
                MemEventTarget::Byte(0x10),
                AccessMode::Mask(MemoryAccess::R),
                no_op_mem_callback(),
            )
            .unwrap();
        registry
            .register_mem_event(
                &driver,
                pfn,
                MemEventTarget::Byte(0x20),
                AccessMode::Mask(MemoryAccess::W),
                no_op_mem_callback(),
            )
            .unwrap();

        driver.fail_next_mem_access();
        let err = registry
            .clear_mem_event(&driver, pfn, MemEventTarget::Byte(0x10))
            .unwrap_err();
        assert!(matches!(err, VmiError::AccessFailure(_)));

        let descriptor = registry.mem_events.get(&pfn).unwrap();
        assert_eq!(descriptor.mask, AccessMode::Mask(MemoryAccess::RW));
        assert!(descriptor.byte_events.contains_key(&0x10));

        registry
            .clear_mem_event(&driver, pfn, MemEventTarget::Byte(0x10))
            .unwrap();
        assert_eq!(
            driver.mem_access_of(pfn),
            Some(AccessMode::Mask(MemoryAccess::W))
        );
    }

    #[test]
    fn register_event_rejects_duplicate_registration() {
        let driver = FakeDriver::new();
        let mut registry = EventRegistry::new();

        registry
            .register_reg_event(
                &driver,
                Register::Cr3,
                AccessMode::Mask(MemoryAccess::W),
                no_op_reg_callback(),
            )
            .unwrap();

        let err = registry
            .register_reg_event(
                &driver,
                Register::Cr3,
                AccessMode::Mask(MemoryAccess::W),
                no_op_reg_callback(),
            )
            .unwrap_err();
        assert!(matches!(err, VmiError::Conflict));
    }

    #[test]
    fn single_step_registers_each_vcpu_at_most_once() {
        let driver = FakeDriver::new();
        let mut registry = EventRegistry::new();

        registry
            .register_single_step(&driver, &[VcpuId(0), VcpuId(1)], Box::new(|_| {}))
            .unwrap();
        assert_eq!(registry.ss_events.len(), 2);

        registry
            .register_single_step(&driver, &[VcpuId(1), VcpuId(2)], Box::new(|_| {}))
            .unwrap();
        assert_eq!(registry.ss_events.len(), 3);

        registry.clear_single_step(&driver, VcpuId(0)).unwrap();
        assert_eq!(registry.ss_events.len(), 2);
    }

    #[test]
    fn teardown_restores_default_access_and_empties_every_table() {
        let driver = FakeDriver::new();
        let mut registry = EventRegistry::new();
        let pfn = Pfn::new(3);

        registry
            .register_mem_event(
                &driver,
                pfn,
                MemEventTarget::Page,
                AccessMode::Mask(MemoryAccess::W),
                no_op_mem_callback(),
            )
            .unwrap();
        assert_eq!(
            driver.mem_access_of(pfn),
            Some(AccessMode::Mask(MemoryAccess::W))
        );

        registry
            .register_reg_event(
                &driver,
                Register::Cr3,
                AccessMode::Mask(MemoryAccess::W),
                no_op_reg_callback(),
            )
            .unwrap();
        registry
            .register_single_step(&driver, &[VcpuId(0)], Box::new(|_| {}))
            .unwrap();

        registry.teardown(&driver);

        // S6: a fresh instance sees the page's write access is no longer
        // enforced.
        assert_eq!(driver.mem_access_of(pfn), Some(AccessMode::None));
        assert!(registry.mem_events.is_empty());
        assert!(registry.reg_events.is_empty());
        assert!(registry.ss_events.is_empty());
    }
}
