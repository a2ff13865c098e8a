use vmi_config::{LinuxOffsets, OsType, VmConfig, WindowsOffsets};

use crate::detect::DetectedOs;

/// The per-OS offset table selected for a guest, bridging a detected (or
/// configured) OS family to the concrete offsets a higher layer needs to
/// walk kernel structures.
///
/// This is a thin selector, not a symbol resolver: it carries whatever
/// offsets the config file supplied and leaves interpreting them (e.g.
/// walking `init_task`) to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestOffsets {
    /// Offsets for a Linux guest.
    Linux(LinuxOffsets),

    /// Offsets for a Windows guest.
    Windows(WindowsOffsets),
}

impl GuestOffsets {
    /// Selects the offset table matching `config.ostype`.
    ///
    /// Returns `None` if the config block does not declare an `ostype`.
    pub fn from_config(config: &VmConfig) -> Option<Self> {
        match config.ostype.as_ref()? {
            OsType::Linux => Some(Self::Linux(config.linux)),
            OsType::Windows => Some(Self::Windows(config.windows)),
        }
    }

    /// Selects the offset table matching a runtime-[`detect`](crate::detect)ed
    /// OS family, ignoring any `ostype` declared in `config`.
    pub fn from_detected(detected: &DetectedOs, config: &VmConfig) -> Option<Self> {
        match detected {
            DetectedOs::None => None,
            DetectedOs::Linux(_) => Some(Self::Linux(config.linux)),
            DetectedOs::Windows(_) => Some(Self::Windows(config.windows)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_linux_offsets_from_declared_ostype() {
        let mut config = VmConfig::default();
        config.ostype = Some(OsType::Linux);
        config.linux.pid = Some(0x398);

        let offsets = GuestOffsets::from_config(&config).unwrap();
        assert!(matches!(offsets, GuestOffsets::Linux(o) if o.pid == Some(0x398)));
    }

    #[test]
    fn undeclared_ostype_yields_none() {
        let config = VmConfig::default();
        assert!(GuestOffsets::from_config(&config).is_none());
    }
}
