//! Guest operating system detection.
//!
//! This crate finds the landmark every OS-introspection layer starts from —
//! the Linux version banner, or the Windows kernel image's `MZ`/`PE` header —
//! by scanning backward and forward from `MSR_LSTAR`. It does not walk
//! process lists, resolve symbols, or parse PE/ELF structures beyond the
//! signature check needed to confirm the landmark; those are left to a
//! higher layer built on top of the offsets this crate's [`offsets`] module
//! selects.

mod detect;
mod offsets;

pub use self::{
    detect::{detect, detect_linux, detect_windows, DetectedOs, LinuxKernelInfo, WindowsKernelInfo},
    offsets::GuestOffsets,
};
