//! Maps [`Register`] onto byte offsets within the blob GDB's `g`/`G`
//! packets carry, per the `org.gnu.gdb.i386.64bit` target description:
//! sixteen 8-byte GPRs and `rip`, followed by seven 4-byte slots
//! (`eflags`, `cs`, `ss`, `ds`, `es`, `fs`, `gs`).
//!
//! Only this subset is obtainable through the GDB stub; everything else
//! (control/debug registers, segment base/limit/attributes, MSRs) is read
//! from the monitor's `info registers` text instead, or is simply
//! unsupported.

use vmi_core::Register;

const QWORD: usize = 8;
const DWORD: usize = 4;

/// Total length of the GDB general-register blob, in bytes.
pub const BLOB_LEN: usize = 17 * QWORD + 7 * DWORD;

enum Width {
    Qword,
    Dword,
}

fn offset(reg: Register) -> Option<(usize, Width)> {
    use Register::*;

    let qword_index = match reg {
        Rax => 0,
        Rbx => 1,
        Rcx => 2,
        Rdx => 3,
        Rsi => 4,
        Rdi => 5,
        Rbp => 6,
        Rsp => 7,
        R8 => 8,
        R9 => 9,
        R10 => 10,
        R11 => 11,
        R12 => 12,
        R13 => 13,
        R14 => 14,
        R15 => 15,
        Rip => 16,
        _ => {
            let dword_index = match reg {
                Rflags => 0,
                CsSelector => 1,
                SsSelector => 2,
                DsSelector => 3,
                EsSelector => 4,
                FsSelector => 5,
                GsSelector => 6,
                _ => return None,
            };
            return Some((17 * QWORD + dword_index * DWORD, Width::Dword));
        }
    };

    Some((qword_index * QWORD, Width::Qword))
}

/// Reads `reg` out of a general-register blob fetched via `g`.
pub fn get(blob: &[u8], reg: Register) -> Option<u64> {
    let (start, width) = offset(reg)?;

    match width {
        Width::Qword => Some(u64::from_le_bytes(blob[start..start + 8].try_into().ok()?)),
        Width::Dword => Some(u32::from_le_bytes(blob[start..start + 4].try_into().ok()?) as u64),
    }
}

/// Patches `reg` within `blob` in place, for a subsequent `G` write-back.
pub fn set(blob: &mut [u8], reg: Register, value: u64) -> Option<()> {
    let (start, width) = offset(reg)?;

    match width {
        Width::Qword => blob[start..start + 8].copy_from_slice(&value.to_le_bytes()),
        Width::Dword => blob[start..start + 4].copy_from_slice(&(value as u32).to_le_bytes()),
    }

    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_general_purpose_register() {
        let mut blob = vec![0u8; BLOB_LEN];
        set(&mut blob, Register::Rax, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(get(&blob, Register::Rax), Some(0x1122_3344_5566_7788));
    }

    #[test]
    fn round_trips_a_segment_selector() {
        let mut blob = vec![0u8; BLOB_LEN];
        set(&mut blob, Register::CsSelector, 0x33).unwrap();
        assert_eq!(get(&blob, Register::CsSelector), Some(0x33));
    }

    #[test]
    fn control_registers_are_not_in_the_gdb_subset() {
        let blob = vec![0u8; BLOB_LEN];
        assert!(get(&blob, Register::Cr3).is_none());
    }
}
