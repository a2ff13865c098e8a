//! Flat physical-memory snapshot backend.
//!
//! Treats a raw dump file as guest physical memory via a writable `mmap`.
//! There are no vCPUs and no event plane: every register and event-plane
//! operation returns [`vmi_core::VmiError::Unsupported`].

mod driver;
mod error;

pub use self::{driver::FileDriver, error::Error};
