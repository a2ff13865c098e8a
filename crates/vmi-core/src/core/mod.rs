mod access_context;
mod access_mode;
mod address_context;
mod hex;
pub(crate) mod macros;
mod memory_access;
mod register;
mod vcpu_id;
mod vmi_info;

pub use self::{
    access_context::{AccessContext, TranslationMechanism},
    access_mode::{AccessMode, Invalid},
    address_context::AddressContext,
    hex::Hex,
    memory_access::MemoryAccess,
    register::Register,
    vcpu_id::VcpuId,
    vmi_info::{AddressWidth, GuestOsFamily, InitMode, VmiInfo},
};

use self::macros::impl_ops;

impl_ops!(Pfn, u64, "Page Frame Number");
impl_ops!(Pa, u64, "Guest Physical Address");
impl_ops!(Va, u64, "Guest Virtual Address");

impl Va {
    /// Checks whether the virtual address is NULL.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Pa {
    /// Returns the page frame number containing this physical address.
    pub fn pfn(self, page_shift: u64) -> Pfn {
        Pfn(self.0 >> page_shift)
    }

    /// Returns the offset of this address within its containing page.
    pub fn page_offset(self, page_shift: u64) -> u64 {
        self.0 & ((1u64 << page_shift) - 1)
    }
}

impl Pfn {
    /// Returns the physical address of the first byte of this frame.
    pub fn address(self, page_shift: u64) -> Pa {
        Pa(self.0 << page_shift)
    }
}
