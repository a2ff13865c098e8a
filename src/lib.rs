//! # Virtual Machine Introspection
//!
//! A modular Virtual Machine Introspection (VMI) library: a backend-agnostic
//! core over Xen, KVM, and flat memory-snapshot files, with an AMD64 paging
//! walk and minimal guest OS detection layered on top.
//!
//! # Architecture
//!
//! [`vmi_core::VmiDriver`] is the seam every backend implements: frame
//! mapping, physical writes, per-vCPU register access, pause/resume, and an
//! optional event plane (register/memory/single-step). [`vmi_core::VmiSession`]
//! wraps a driver with a page cache and an event registry and is generic over
//! the driver type; it has no notion of guest address spaces or operating
//! systems.
//!
//! [`Vmi`] sits on top of a session and adds the two things a driver-level
//! session can't provide on its own: virtual-address translation (via
//! [`vmi_arch_amd64::Amd64`]'s page-table walk) and guest OS detection (via
//! [`vmi_os::detect`]). It is the type most callers construct directly.
//!
//! Three backends are available as features, each a thin crate re-exported
//! under [`driver`]:
//!
//! - `driver-xen` — live Xen domains, via the hypervisor's monitor/foreign-
//!   memory/xenstore handles.
//! - `driver-kvm` — live QEMU/KVM guests, via the QMP monitor and a GDB stub.
//! - `driver-file` — a flat file treated as a physical memory snapshot; no
//!   register or event support.
//!
//! # Address spaces
//!
//! Reads and writes take a [`vmi_core::AccessContext`]: either
//! [`vmi_core::TranslationMechanism::Direct`] (the address is already
//! physical) or [`vmi_core::TranslationMechanism::Paging`] (the address is
//! virtual, translated through the paging structures rooted at an explicit
//! physical address, or at the target vCPU's current `CR3` if none is given).
//! This covers physical access, "current/kernel" virtual access, and access
//! through an arbitrary process's address space uniformly — the only
//! difference is which root the caller supplies.
//!
//! # Current limitations
//!
//! This library does not execute guest code, take atomic multi-page
//! snapshots, recover from a crashed guest, or target anything other than
//! x86 (32- or 64-bit). OS introspection above banner/header detection
//! (process lists, symbol resolution) is left to a higher layer; see
//! [`vmi_os`] and [`vmi_config`] for the offset tables such a layer would
//! consume.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod init;
mod translate;

pub use self::init::Vmi;
pub use vmi_core::*;

/// AMD64 register layout and the page-table walk.
pub mod arch {
    pub use vmi_arch_amd64::*;
}

/// Backend implementations of [`vmi_core::VmiDriver`].
pub mod driver {
    #[cfg(feature = "driver-file")]
    pub mod file {
        pub use vmi_driver_file::*;
    }

    #[cfg(feature = "driver-kvm")]
    pub mod kvm {
        pub use vmi_driver_kvm::*;
    }

    #[cfg(feature = "driver-xen")]
    pub mod xen {
        pub use vmi_driver_xen::*;
    }
}

/// Guest OS detection and offset tables.
pub mod os {
    pub use vmi_os::*;
}

/// Configuration-file offset tables (`vmi.ini`-style, one section per guest).
pub mod config {
    pub use vmi_config::*;
}
