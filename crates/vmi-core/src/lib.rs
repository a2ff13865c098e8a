//! Core VMI functionality: the driver contract, the page cache, the event
//! registry, and the session dispatcher that ties them together.

mod core;
mod driver;
mod error;
mod event_registry;
mod page;
mod page_cache;
mod session;

pub use self::{
    core::{
        AccessContext, AccessMode, AddressContext, AddressWidth, GuestOsFamily, Hex, InitMode,
        Invalid, MemoryAccess, Pa, Pfn, Register, TranslationMechanism, Va, VcpuId, VmiInfo,
    },
    driver::{RawEvent, VmiDriver},
    error::{PageFaults, VmiError},
    event_registry::{
        EventRegistry, MemEventTarget, MemoryEventCallback, RegisterEventCallback,
        SingleStepEventCallback,
    },
    page::VmiMappedPage,
    page_cache::PageCache,
    session::VmiSession,
};
