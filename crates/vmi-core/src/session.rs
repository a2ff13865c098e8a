use crate::{
    AccessMode, MemoryAccess, Pa, Pfn, Register, VcpuId, VmiDriver, VmiError, VmiMappedPage,
    event_registry::{EventRegistry, MemEventTarget, MemoryEventCallback, RegisterEventCallback, SingleStepEventCallback},
    page_cache::PageCache,
};

/// The session dispatcher: owns the backend, the page cache, and the event
/// registry, and routes every public call to the right place.
///
/// Read/write calls go through the page cache; register and event calls
/// bypass it entirely, per the driver contract.
pub struct VmiSession<D>
where
    D: VmiDriver,
{
    driver: D,
    cache: PageCache,
    events: EventRegistry,
    shutting_down: bool,
}

impl<D> VmiSession<D>
where
    D: VmiDriver,
{
    /// The default soft cap for the page cache.
    const DEFAULT_CACHE_CAP: usize = 8192;

    /// Wraps an already-initialized driver in a session.
    pub fn new(driver: D) -> Self {
        Self::with_cache_cap(driver, Self::DEFAULT_CACHE_CAP)
    }

    /// Wraps an already-initialized driver in a session with an explicit
    /// page cache soft cap (0 = unbounded).
    pub fn with_cache_cap(driver: D, cache_cap: usize) -> Self {
        Self {
            driver,
            cache: PageCache::new(cache_cap),
            events: EventRegistry::new(),
            shutting_down: false,
        }
    }

    /// Returns the underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Tears the session down: drains the event registry, flushes the
    /// cache, destroys the driver. Idempotent.
    pub fn destroy(&mut self) -> Result<(), VmiError> {
        if self.shutting_down {
            return Ok(());
        }
        self.shutting_down = true;

        self.events.teardown(&self.driver);
        self.cache.flush();
        self.driver.destroy()
    }

    /// Reads `len` bytes starting at the guest physical address `pa`.
    pub fn read_pa(&self, pa: Pa, buf: &mut [u8]) -> Result<(), VmiError> {
        let info = self.driver.info();
        let page_shift = info.page_shift;
        let page_size = info.page_size;

        let mut remaining = buf.len();
        let mut written = 0usize;
        let mut addr = pa;

        while remaining > 0 {
            let pfn = addr.pfn(page_shift);
            let offset = addr.page_offset(page_shift) as usize;
            let chunk = remaining.min((page_size as usize) - offset);

            let page = self.cache.insert(&self.driver, pfn, MemoryAccess::R)?;
            buf[written..written + chunk].copy_from_slice(&page[offset..offset + chunk]);

            written += chunk;
            remaining -= chunk;
            addr = Pa(addr.0 + chunk as u64);
        }

        Ok(())
    }

    /// Writes `buf` starting at the guest physical address `pa`.
    pub fn write_pa(&self, pa: Pa, buf: &[u8]) -> Result<(), VmiError> {
        self.driver.write(pa, buf)
    }

    /// Reads the value of `reg` on `vcpu`. Bypasses the page cache.
    pub fn get_vcpureg(&self, reg: Register, vcpu: VcpuId) -> Result<u64, VmiError> {
        self.driver.get_vcpureg(reg, vcpu)
    }

    /// Sets the value of `reg` on `vcpu`. Callers MUST pause the VM first.
    pub fn set_vcpureg(&self, reg: Register, vcpu: VcpuId, value: u64) -> Result<(), VmiError> {
        self.driver.set_vcpureg(reg, vcpu, value)
    }

    /// Pauses the VM.
    pub fn pause(&self) -> Result<(), VmiError> {
        self.driver.pause()
    }

    /// Resumes the VM.
    pub fn resume(&self) -> Result<(), VmiError> {
        self.driver.resume()
    }

    /// Registers a page-granularity memory event.
    pub fn register_mem_event_page(
        &mut self,
        pfn: Pfn,
        access: AccessMode,
        callback: MemoryEventCallback,
    ) -> Result<(), VmiError> {
        self.events
            .register_mem_event(&self.driver, pfn, MemEventTarget::Page, access, callback)
    }

    /// Registers a byte-granularity memory event.
    pub fn register_mem_event_byte(
        &mut self,
        pfn: Pfn,
        offset: u16,
        access: AccessMode,
        callback: MemoryEventCallback,
    ) -> Result<(), VmiError> {
        self.events.register_mem_event(
            &self.driver,
            pfn,
            MemEventTarget::Byte(offset),
            access,
            callback,
        )
    }

    /// Clears a page-granularity memory event.
    pub fn clear_mem_event_page(&mut self, pfn: Pfn) -> Result<(), VmiError> {
        self.events
            .clear_mem_event(&self.driver, pfn, MemEventTarget::Page)
    }

    /// Clears a byte-granularity memory event.
    pub fn clear_mem_event_byte(&mut self, pfn: Pfn, offset: u16) -> Result<(), VmiError> {
        self.events
            .clear_mem_event(&self.driver, pfn, MemEventTarget::Byte(offset))
    }

    /// Registers a register event.
    pub fn register_reg_event(
        &mut self,
        reg: Register,
        access: AccessMode,
        callback: RegisterEventCallback,
    ) -> Result<(), VmiError> {
        self.events
            .register_reg_event(&self.driver, reg, access, callback)
    }

    /// Clears a register event.
    pub fn clear_reg_event(&mut self, reg: Register) -> Result<(), VmiError> {
        self.events.clear_reg_event(&self.driver, reg)
    }

    /// Registers single-step monitoring on the given vCPUs.
    pub fn register_single_step(
        &mut self,
        vcpus: &[VcpuId],
        callback: SingleStepEventCallback,
    ) -> Result<(), VmiError> {
        self.events
            .register_single_step(&self.driver, vcpus, callback)
    }

    /// Clears single-step monitoring on a vCPU.
    pub fn clear_single_step(&mut self, vcpu: VcpuId) -> Result<(), VmiError> {
        self.events.clear_single_step(&self.driver, vcpu)
    }

    /// Polls for and dispatches pending events.
    pub fn events_listen(&mut self, timeout_ms: u32) -> Result<(), VmiError> {
        self.events.listen(&self.driver, timeout_ms)
    }

    /// Maps a single guest page without going through the cache. Used by
    /// the page-table walk, which needs a host pointer but does not benefit
    /// from caching intermediate page-table pages as aggressively as data
    /// pages.
    pub fn map_frame(&self, pfn: Pfn, protection: MemoryAccess) -> Result<VmiMappedPage, VmiError> {
        self.cache.insert(&self.driver, pfn, protection)
    }
}

impl<D> Drop for VmiSession<D>
where
    D: VmiDriver,
{
    fn drop(&mut self) {
        let _ = self.destroy();
    }
}
