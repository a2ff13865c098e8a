use std::{cell::RefCell, fs::OpenOptions, path::Path};

use memmap2::MmapMut;
use vmi_core::{
    AccessMode, MemoryAccess, Pa, Pfn, Register, VcpuId, VmiDriver, VmiError, VmiInfo,
    VmiMappedPage,
};

use crate::error::Error;

/// VMI driver treating a flat file as a snapshot of guest physical memory.
///
/// Every register and event-plane operation is unsupported: a snapshot has
/// no live vCPUs and nothing left to notify on.
pub struct FileDriver {
    mmap: RefCell<MmapMut>,
    info: VmiInfo,
}

impl FileDriver {
    /// Opens `path` and maps its entire contents as guest physical memory.
    ///
    /// `page_size`/`page_shift` follow the amd64 convention (4 KiB pages);
    /// the file's length need not be page-aligned, but any access crossing
    /// its end fails with [`VmiError::OutOfBounds`].
    pub fn new(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let info = VmiInfo {
            address_width: vmi_core::AddressWidth::Width8,
            page_size: 0x1000,
            page_shift: 12,
            memory_size: mmap.len() as u64,
            vcpu_count: 0,
            paravirtualized: false,
            guest_os_family: vmi_core::GuestOsFamily::None,
            supports_events: false,
        };

        Ok(Self { mmap: RefCell::new(mmap), info })
    }
}

impl VmiDriver for FileDriver {
    fn info(&self) -> &VmiInfo {
        &self.info
    }

    fn destroy(&mut self) -> Result<(), VmiError> {
        Ok(())
    }

    fn map_frame(&self, pfn: Pfn, _protection: MemoryAccess) -> Result<VmiMappedPage, VmiError> {
        let page_size = self.info.page_size as usize;
        let start = (pfn.0 as usize)
            .checked_mul(page_size)
            .ok_or(Error::OutOfBounds)?;
        let end = start.checked_add(page_size).ok_or(Error::OutOfBounds)?;

        let page = self
            .mmap
            .borrow()
            .get(start..end)
            .ok_or(Error::OutOfBounds)?
            .to_vec();

        Ok(VmiMappedPage::new(page))
    }

    fn write(&self, paddr: Pa, buf: &[u8]) -> Result<(), VmiError> {
        let start = paddr.0 as usize;
        let end = start.checked_add(buf.len()).ok_or(Error::OutOfBounds)?;

        let mut mmap = self.mmap.borrow_mut();
        let slice = mmap.get_mut(start..end).ok_or(Error::OutOfBounds)?;
        slice.copy_from_slice(buf);

        Ok(())
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

    fn set_reg_access(&self, _reg: Register, _access: AccessMode) -> Result<(), VmiError> {
        Err(VmiError::Unsupported)
    }

    fn set_mem_access(&self, _pfn: Pfn, _access: AccessMode) -> Result<(), VmiError> {
        Err(VmiError::Unsupported)
    }
}

impl std::fmt::Debug for FileDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("FileDriver").field("info", &self.info).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write as _, path::PathBuf};

    use super::*;

    struct TempSnapshot {
        path: PathBuf,
        data: Vec<u8>,
    }

    impl Drop for TempSnapshot {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn snapshot(size: usize, tag: &str) -> TempSnapshot {
        let path = std::env::temp_dir().join(format!("vmi-driver-file-test-{tag}.img"));
        let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();

        let mut file = File::create(&path).unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        TempSnapshot { path, data }
    }

    #[test]
    fn read_pa_matches_snapshot_contents() {
        let snapshot = snapshot(16 * 1024 * 1024, "read");
        let driver = FileDriver::new(&snapshot.path).unwrap();

        let page = driver.map_frame(Pfn::new(1), MemoryAccess::R).unwrap();
        assert_eq!(&page[0..16], &snapshot.data[0x1000..0x1010]);
    }

    #[test]
    fn write_then_read_round_trips() {
        let snapshot = snapshot(4096, "write");
        let driver = FileDriver::new(&snapshot.path).unwrap();

        driver.write(Pa::new(0x10), &[0xaa; 8]).unwrap();
        let page = driver.map_frame(Pfn::new(0), MemoryAccess::R).unwrap();
        assert_eq!(&page[0x10..0x18], &[0xaa; 8]);
    }

    #[test]
    fn register_access_is_unsupported() {
        let snapshot = snapshot(4096, "unsupported");
        let driver = FileDriver::new(&snapshot.path).unwrap();

        assert!(matches!(
            driver.get_vcpureg(Register::Rip, VcpuId(0)),
            Err(VmiError::Unsupported)
        ));
    }
}
