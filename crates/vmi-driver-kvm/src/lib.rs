//! KVM/QEMU backend.
//!
//! Memory and registers are reached over two sockets QEMU already exposes
//! without patching: the QMP monitor (`-qmp tcp:...`) for lifecycle control
//! (pause/resume, vCPU/memory info) and a GDB stub (`-gdb tcp::...`) for
//! the register file and, absent a patched fast-access monitor command,
//! memory itself.

mod driver;
mod error;
mod gdb;
mod monitor_text;
mod qmp;
mod registers;

pub use self::{driver::KvmDriver, error::Error};
