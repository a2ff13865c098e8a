use vmi_arch_amd64::Amd64;
use vmi_core::{InitMode, VcpuId, VmiDriver, VmiError, VmiSession};
use vmi_os::DetectedOs;

/// A driver-agnostic introspection instance.
///
/// Wraps a [`VmiSession`] with virtual-address translation and (optionally)
/// guest OS detection. Construct one backend driver (e.g.
/// [`vmi_driver_xen::XenDriver::new`]) and hand it to [`Vmi::new`]; name-to-id
/// resolution is a backend concern and happens before this point (most
/// drivers expose a `id_from_name` associated function for it).
pub struct Vmi<D>
where
    D: VmiDriver,
{
    session: VmiSession<D>,
    os: DetectedOs,
}

impl<D> Vmi<D>
where
    D: VmiDriver,
{
    /// Brings up a session over `driver` per `mode`.
    ///
    /// If `mode` requests events and the driver doesn't implement the event
    /// plane, initialization fails with [`VmiError::Unsupported`]. If `mode`
    /// requests full introspection, this additionally detects the guest OS
    /// from vCPU 0; any failure here (not merely failing to recognize the
    /// guest, which is a normal outcome) tears the session down before
    /// returning.
    pub fn new(driver: D, mode: InitMode) -> Result<Self, VmiError> {
        if mode.contains(InitMode::EVENTS) && !driver.info().supports_events {
            return Err(VmiError::Unsupported);
        }

        let session = VmiSession::new(driver);

        let os = if mode.contains(InitMode::FULL) {
            match Self::detect_os(&session) {
                Ok(os) => os,
                Err(err) => {
                    let mut session = session;
                    let _ = session.destroy();
                    return Err(err);
                }
            }
        }
        else {
            DetectedOs::None
        };

        Ok(Self { session, os })
    }

    fn detect_os(session: &VmiSession<D>) -> Result<DetectedOs, VmiError> {
        let registers = Amd64::registers_of(session, VcpuId(0))?;
        vmi_os::detect(session, &registers)
    }

    /// The guest OS detected at construction time, or [`DetectedOs::None`] if
    /// it wasn't requested or wasn't recognized.
    pub fn os(&self) -> &DetectedOs {
        &self.os
    }

    /// The underlying session, for operations [`Vmi`] doesn't wrap directly
    /// (event registration, raw physical read/write, register access).
    pub fn session(&self) -> &VmiSession<D> {
        &self.session
    }

    /// The underlying session, mutably.
    pub fn session_mut(&mut self) -> &mut VmiSession<D> {
        &mut self.session
    }

    /// Tears the instance down. Idempotent; also runs on drop.
    pub fn destroy(&mut self) -> Result<(), VmiError> {
        self.session.destroy()
    }
}

#[cfg(test)]
mod tests {
    use vmi_core::{AddressWidth, GuestOsFamily, MemoryAccess, Pa, Pfn, Register, VmiInfo, VmiMappedPage};

    use super::*;

    /// A driver with no vCPUs and no event plane, standing in for the file
    /// backend in these tests.
    struct NoRegsDriver {
        info: VmiInfo,
    }

    impl NoRegsDriver {
        fn new() -> Self {
            Self {
                info: VmiInfo {
                    address_width: AddressWidth::Width8,
                    page_size: Amd64::PAGE_SIZE,
                    page_shift: Amd64::PAGE_SHIFT,
                    memory_size: 0,
                    vcpu_count: 0,
                    paravirtualized: false,
                    guest_os_family: GuestOsFamily::None,
                    supports_events: false,
                },
            }
        }
    }

    impl VmiDriver for NoRegsDriver {
        fn info(&self) -> &VmiInfo {
            &self.info
        }

        fn destroy(&mut self) -> Result<(), VmiError> {
            Ok(())
        }

        fn map_frame(&self, _pfn: Pfn, _protection: MemoryAccess) -> Result<VmiMappedPage, VmiError> {
            Err(VmiError::Unsupported)
        }

        fn write(&self, _pa: Pa, _buf: &[u8]) -> Result<(), VmiError> {
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
    }

    #[test]
    fn partial_init_skips_os_detection() {
        let vmi = Vmi::new(NoRegsDriver::new(), InitMode::PARTIAL).unwrap();
        assert_eq!(*vmi.os(), DetectedOs::None);
    }

    #[test]
    fn events_requested_on_unsupported_backend_fails() {
        let err = Vmi::new(NoRegsDriver::new(), InitMode::PARTIAL | InitMode::EVENTS).unwrap_err();
        assert!(matches!(err, VmiError::Unsupported));
    }

    #[test]
    fn full_init_on_backend_without_registers_fails_and_tears_down() {
        let err = Vmi::new(NoRegsDriver::new(), InitMode::FULL).unwrap_err();
        assert!(matches!(err, VmiError::Unsupported));
    }
}
