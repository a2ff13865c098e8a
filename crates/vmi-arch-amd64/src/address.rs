use vmi_core::{Pa, Pfn};

use crate::{Amd64, Cr3};

impl From<Cr3> for Pfn {
    fn from(value: Cr3) -> Self {
        Self(value.page_frame_number())
    }
}

impl From<Cr3> for Pa {
    fn from(value: Cr3) -> Self {
        Pfn::from(value).address(Amd64::PAGE_SHIFT)
    }
}
