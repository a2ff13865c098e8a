use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Requested initialization mode, passed to the session dispatcher.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct InitMode: u8 {
        /// Bring up memory access only.
        const PARTIAL = 0b001;

        /// Also detect and introspect the guest operating system.
        const FULL = 0b010;

        /// Enable event delivery (memory/register/single-step).
        const EVENTS = 0b100;
    }
}

/// The width of a guest address, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AddressWidth {
    /// 32-bit guest.
    Width4 = 4,

    /// 64-bit guest.
    Width8 = 8,
}

impl AddressWidth {
    /// Returns the width in bytes.
    pub fn bytes(self) -> u8 {
        self as u8
    }

    /// Builds an [`AddressWidth`] from a byte count, rejecting anything
    /// other than 4 or 8.
    pub fn from_bytes(value: u64) -> Option<Self> {
        match value {
            4 => Some(AddressWidth::Width4),
            8 => Some(AddressWidth::Width8),
            _ => None,
        }
    }
}

/// The detected guest operating system family.
///
/// Once detected, the offset table associated with it is frozen for the
/// lifetime of the instance unless explicitly re-detected.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GuestOsFamily {
    /// OS introspection was not requested or did not succeed.
    #[default]
    None,

    /// A Linux guest.
    Linux,

    /// A Windows guest.
    Windows,
}

/// Static information about an introspector instance, gathered at
/// initialization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmiInfo {
    /// Discovered guest address width.
    pub address_width: AddressWidth,

    /// The page size, in bytes. Always `1 << page_shift`.
    pub page_size: u64,

    /// `log2(page_size)`.
    pub page_shift: u64,

    /// Total guest physical memory size, in bytes.
    pub memory_size: u64,

    /// Number of vCPUs.
    pub vcpu_count: u16,

    /// `true` if the guest is paravirtualized, `false` if it is
    /// hardware-virtualized.
    pub paravirtualized: bool,

    /// The detected guest OS family.
    pub guest_os_family: GuestOsFamily,

    /// Whether this backend implements the event plane at all (`set_*_access`,
    /// `start_single_step`, `events_listen`), independent of whether the
    /// caller asked for events at init time.
    pub supports_events: bool,
}

impl VmiInfo {
    /// Returns the page frame number containing a physical address.
    pub fn pfn_of(&self, pa: u64) -> u64 {
        pa >> self.page_shift
    }

    /// Returns the offset of a physical address within its containing page.
    pub fn page_offset_of(&self, pa: u64) -> u64 {
        pa & (self.page_size - 1)
    }
}
