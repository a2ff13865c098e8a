//! Scrapes the handful of fields this driver needs out of QEMU's
//! `info registers` human-monitor text, e.g.:
//!
//! ```text
//! RAX=0000000000000000 RBX=ffff888001234000 ...
//! CR0=80050033 CR2=0000000000000000 CR3=000000012a4e0000 CR4=00000000000006e0
//! ```
//!
//! Whitespace-separated `KEY=hex` tokens; order and surrounding lines are
//! not relied upon, since QEMU's exact layout has drifted across versions.

/// The subset of control registers not reachable through the GDB stub.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControlRegisters {
    pub cr0: Option<u64>,
    pub cr2: Option<u64>,
    pub cr3: Option<u64>,
    pub cr4: Option<u64>,
}

pub fn parse_control_registers(text: &str) -> ControlRegisters {
    let mut regs = ControlRegisters::default();

    for token in text.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else { continue };
        let Ok(value) = u64::from_str_radix(value, 16) else { continue };

        match key {
            "CR0" => regs.cr0 = Some(value),
            "CR2" => regs.cr2 = Some(value),
            "CR3" => regs.cr3 = Some(value),
            "CR4" => regs.cr4 = Some(value),
            _ => {}
        }
    }

    regs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_control_registers_from_info_registers_output() {
        let text = "RAX=0000000000000000 RBX=ffff888001234000\n\
                     CR0=80050033 CR2=0000000000000000 CR3=000000012a4e0000 CR4=00000000000006e0\n";

        let regs = parse_control_registers(text);
        assert_eq!(regs.cr0, Some(0x80050033));
        assert_eq!(regs.cr3, Some(0x0000_0001_2a4e_0000));
        assert_eq!(regs.cr4, Some(0x6e0));
    }

    #[test]
    fn tolerates_missing_fields() {
        let regs = parse_control_registers("RAX=0000000000000000");
        assert_eq!(regs, ControlRegisters::default());
    }
}
