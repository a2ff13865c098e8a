use vmi_arch_amd64::{Amd64, Registers};
use vmi_core::{GuestOsFamily, Va, VmiDriver, VmiError, VmiSession};

/// A Linux guest, identified by its version banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxKernelInfo {
    /// The virtual address the banner string was found at.
    pub banner_address: Va,

    /// The banner text itself, e.g. `"Linux version 5.4.0 (...)"`.
    pub banner: String,
}

/// A Windows guest, identified by its kernel image's `MZ`/`PE` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowsKernelInfo {
    /// The virtual address of the kernel image's DOS header.
    pub kernel_base: Va,
}

/// The result of a [`detect`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedOs {
    /// No known signature was found in the search window.
    None,

    /// A Linux guest.
    Linux(LinuxKernelInfo),

    /// A Windows guest.
    Windows(WindowsKernelInfo),
}

impl DetectedOs {
    /// The corresponding [`GuestOsFamily`], for recording in [`vmi_core::VmiInfo`].
    pub fn family(&self) -> GuestOsFamily {
        match self {
            DetectedOs::None => GuestOsFamily::None,
            DetectedOs::Linux(_) => GuestOsFamily::Linux,
            DetectedOs::Windows(_) => GuestOsFamily::Windows,
        }
    }
}

const LINUX_VERSION_SIGNATURE: &[u8] = b"Linux version";
const LINUX_MAX_BACKWARD_SEARCH: u64 = 16 * 1024 * 1024;
const LINUX_MAX_FORWARD_SEARCH: u64 = 16 * 1024 * 1024;
const WINDOWS_MAX_BACKWARD_SEARCH: u64 = 32 * 1024 * 1024;

/// Scans backward and forward from `MSR_LSTAR` (page-aligned) for the Linux
/// version banner, the same landmark `init_task`/symbol resolution in a full
/// introspection layer would start from.
///
/// Only the banner itself is extracted here; resolving `init_task` or any
/// other symbol from `sysmap`/a config file offset is left to the caller.
pub fn detect_linux<D>(
    session: &VmiSession<D>,
    registers: &Registers,
) -> Result<Option<LinuxKernelInfo>, VmiError>
where
    D: VmiDriver,
{
    let mode = match Amd64::paging_mode(registers) {
        Some(mode) => mode,
        None => return Ok(None),
    };
    let root = registers.translation_root();

    let lstar = registers.msr_lstar & Amd64::PAGE_MASK;
    let from_va = lstar.saturating_sub(LINUX_MAX_BACKWARD_SEARCH);
    let to_va = lstar + LINUX_MAX_FORWARD_SEARCH;

    let mut data = [0u8; Amd64::PAGE_SIZE as usize];

    for va in (from_va..=to_va).step_by(Amd64::PAGE_SIZE as usize).rev() {
        let va = Va(va);

        match Amd64::read_va(session, va, root, mode, &mut data) {
            Ok(()) => {}
            Err(VmiError::Translation(_)) => continue,
            Err(err) => return Err(err),
        }

        for index in memchr::memmem::find_iter(&data, LINUX_VERSION_SIGNATURE) {
            let rest = &data[index..];
            let end = memchr::memchr(0, rest).or_else(|| memchr::memchr(b'\n', rest));

            let Some(end) = end else { continue };

            tracing::debug!(%va, index, "found Linux version banner");

            return Ok(Some(LinuxKernelInfo {
                banner_address: Va(va.0 + index as u64),
                banner: String::from_utf8_lossy(&rest[..end]).into_owned(),
            }));
        }
    }

    Ok(None)
}

/// Scans backward from `MSR_LSTAR` (page-aligned) for a page beginning with
/// `MZ` whose `e_lfanew` points at a `PE\0\0` signature.
///
/// This is a signature check, not a PE parse: section tables, the export
/// directory, and everything else a symbol resolver would need are left to
/// a higher layer.
pub fn detect_windows<D>(
    session: &VmiSession<D>,
    registers: &Registers,
) -> Result<Option<WindowsKernelInfo>, VmiError>
where
    D: VmiDriver,
{
    let mode = match Amd64::paging_mode(registers) {
        Some(mode) => mode,
        None => return Ok(None),
    };
    let root = registers.translation_root();

    let lstar = registers.msr_lstar & Amd64::PAGE_MASK;
    let from_va = lstar.saturating_sub(WINDOWS_MAX_BACKWARD_SEARCH);

    let mut data = [0u8; Amd64::PAGE_SIZE as usize];

    for va in (from_va..=lstar).step_by(Amd64::PAGE_SIZE as usize).rev() {
        let va = Va(va);

        match Amd64::read_va(session, va, root, mode, &mut data) {
            Ok(()) => {}
            Err(VmiError::Translation(_)) => continue,
            Err(err) => return Err(err),
        }

        if !looks_like_pe_header(&data) {
            continue;
        }

        tracing::debug!(%va, "found Windows kernel image header");
        return Ok(Some(WindowsKernelInfo { kernel_base: va }));
    }

    Ok(None)
}

fn looks_like_pe_header(data: &[u8]) -> bool {
    if data.len() < 0x40 || &data[..2] != b"MZ" {
        return false;
    }

    let e_lfanew = u32::from_le_bytes(data[0x3c..0x40].try_into().unwrap()) as usize;

    matches!(data.get(e_lfanew..e_lfanew + 4), Some(sig) if sig == b"PE\0\0")
}

/// Tries [`detect_linux`] then [`detect_windows`], returning whichever
/// matches first (or [`DetectedOs::None`] if neither does).
pub fn detect<D>(session: &VmiSession<D>, registers: &Registers) -> Result<DetectedOs, VmiError>
where
    D: VmiDriver,
{
    if let Some(info) = detect_linux(session, registers)? {
        return Ok(DetectedOs::Linux(info));
    }

    if let Some(info) = detect_windows(session, registers)? {
        return Ok(DetectedOs::Windows(info));
    }

    Ok(DetectedOs::None)
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write as _, path::PathBuf};

    use vmi_arch_amd64::{Cr3, Registers};
    use vmi_core::Pa;
    use vmi_driver_file_test_support::identity_mapped_snapshot;

    use super::*;

    mod vmi_driver_file_test_support {
        //! Builds a flat snapshot with a single identity-mapped 4-level
        //! page table hierarchy, so virtual-address reads in these tests
        //! exercise the real page-table walk rather than stubbing it out.
        use super::*;

        pub const PML4_PFN: u64 = 1;
        pub const PDPT_PFN: u64 = 2;
        pub const PD_PFN: u64 = 3;
        pub const PT_PFN: u64 = 4;
        pub const DATA_PFN: u64 = 5;

        pub struct Snapshot {
            pub path: PathBuf,
        }

        impl Drop for Snapshot {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }

        fn pte(pfn: u64) -> u64 {
            (pfn << 12) | 0b11 // present, writable
        }

        /// Builds a snapshot large enough to identity-map `va` (which must
        /// fall within the first `PT` page, i.e. below 2 MiB) and writes
        /// `payload` at that address's backing data page.
        pub fn identity_mapped_snapshot(va: u64, payload: &[u8], tag: &str) -> (Snapshot, Pa) {
            let page_size = 0x1000usize;
            let mut data = vec![0u8; page_size * 6];

            let pml4i = ((va >> 39) & 0x1ff) as usize;
            let pdpti = ((va >> 30) & 0x1ff) as usize;
            let pdi = ((va >> 21) & 0x1ff) as usize;
            let pti = ((va >> 12) & 0x1ff) as usize;

            let write_entry = |data: &mut [u8], table_pfn: u64, index: usize, value: u64| {
                let base = (table_pfn as usize) * page_size + index * 8;
                data[base..base + 8].copy_from_slice(&value.to_le_bytes());
            };

            write_entry(&mut data, PML4_PFN, pml4i, pte(PDPT_PFN));
            write_entry(&mut data, PDPT_PFN, pdpti, pte(PD_PFN));
            write_entry(&mut data, PD_PFN, pdi, pte(PT_PFN));
            write_entry(&mut data, PT_PFN, pti, pte(DATA_PFN));

            let data_page_start = (DATA_PFN as usize) * page_size;
            let offset = (va & 0xfff) as usize;
            data[data_page_start + offset..data_page_start + offset + payload.len()]
                .copy_from_slice(payload);

            let path = std::env::temp_dir().join(format!("vmi-os-test-{tag}.img"));
            let mut file = File::create(&path).unwrap();
            file.write_all(&data).unwrap();
            file.flush().unwrap();

            (Snapshot { path }, Pa::new(PML4_PFN << 12))
        }
    }

    fn ia32e_registers(root: Pa, lstar: u64) -> Registers {
        let mut registers = Registers::default();
        registers.cr0.0 = 1 << 31; // PG
        registers.cr4.0 = 1 << 5; // PAE
        registers.msr_efer.0 = (1 << 8) | (1 << 10); // LME, LMA
        registers.cr3 = Cr3::from(root.0);
        registers.msr_lstar = lstar;
        registers
    }

    #[test]
    fn detects_linux_banner() {
        const LSTAR: u64 = 0xffff_ffff_8160_0000;

        let banner = b"Linux version 6.5.0-generic (buildd@host) #1 SMP\n\0";
        let (snapshot, root) = identity_mapped_snapshot(LSTAR, banner, "linux");

        let driver = vmi_driver_file::FileDriver::new(&snapshot.path).unwrap();
        let session = VmiSession::new(driver);
        let registers = ia32e_registers(root, LSTAR);

        let info = detect_linux(&session, &registers).unwrap().unwrap();
        assert!(info.banner.starts_with("Linux version 6.5.0-generic"));
    }

    #[test]
    fn detects_windows_header() {
        const LSTAR: u64 = 0xffff_ffff_8160_0000;

        let mut image = vec![0u8; 0x100];
        image[0..2].copy_from_slice(b"MZ");
        image[0x3c..0x40].copy_from_slice(&0x80u32.to_le_bytes());
        image[0x80..0x84].copy_from_slice(b"PE\0\0");

        let (snapshot, root) = identity_mapped_snapshot(LSTAR, &image, "windows");

        let driver = vmi_driver_file::FileDriver::new(&snapshot.path).unwrap();
        let session = VmiSession::new(driver);
        let registers = ia32e_registers(root, LSTAR);

        let info = detect_windows(&session, &registers).unwrap().unwrap();
        assert_eq!(info.kernel_base, Va(LSTAR));
    }

    #[test]
    fn no_signature_in_range_returns_none() {
        const LSTAR: u64 = 0xffff_ffff_8160_0000;

        let (snapshot, root) = identity_mapped_snapshot(LSTAR, b"nothing interesting here", "none");

        let driver = vmi_driver_file::FileDriver::new(&snapshot.path).unwrap();
        let session = VmiSession::new(driver);
        let mut registers = ia32e_registers(root, LSTAR);
        registers.msr_lstar = LSTAR;

        assert_eq!(detect(&session, &registers).unwrap(), DetectedOs::None);
    }
}
