use serde::{Deserialize, Serialize};

use crate::MemoryAccess;

/// The effective access mode enforced on a memory event registration.
///
/// This is deliberately a sum type rather than a raw bitmask: the
/// execute-on-write mode is a distinguished value that cannot be merged with
/// anything else, and representing it as just another bit pattern would let
/// nonsensical combinations (e.g. execute-on-write *and* read) type-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    /// No access is monitored.
    None,

    /// A combination of read/write/execute access is monitored.
    Mask(MemoryAccess),

    /// Execute-on-write: a write-protection trick used to catch code about
    /// to execute from a page that was just written to. Mutually exclusive
    /// with every other mode, including itself combined with a different
    /// mode.
    ExecuteOnWrite,
}

/// The error returned when two [`AccessMode`] values cannot be combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("incompatible access modes")]
pub struct Invalid;

impl AccessMode {
    /// Combines this access mode with an additionally requested one,
    /// producing the new effective mode.
    ///
    /// Rules, in order:
    /// 1. Equal inputs combine to the same value.
    /// 2. [`AccessMode::None`] is the identity element.
    /// 3. [`AccessMode::ExecuteOnWrite`] cannot be combined with anything
    ///    else.
    /// 4. Otherwise, the result is the bitwise union of the two masks.
    pub fn combine(self, other: AccessMode) -> Result<AccessMode, Invalid> {
        if self == other {
            return Ok(self);
        }

        match (self, other) {
            (AccessMode::None, other) => Ok(other),
            (this, AccessMode::None) => Ok(this),
            (AccessMode::ExecuteOnWrite, _) | (_, AccessMode::ExecuteOnWrite) => Err(Invalid),
            (AccessMode::Mask(lhs), AccessMode::Mask(rhs)) => Ok(AccessMode::Mask(lhs | rhs)),
        }
    }
}

impl Default for AccessMode {
    fn default() -> Self {
        AccessMode::None
    }
}

impl From<MemoryAccess> for AccessMode {
    fn from(value: MemoryAccess) -> Self {
        if value.is_empty() {
            AccessMode::None
        }
        else {
            AccessMode::Mask(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let rw = AccessMode::Mask(MemoryAccess::RW);
        assert_eq!(rw.combine(AccessMode::None), Ok(rw));
        assert_eq!(AccessMode::None.combine(rw), Ok(rw));
    }

    #[test]
    fn equal_masks_are_idempotent() {
        let r = AccessMode::Mask(MemoryAccess::R);
        assert_eq!(r.combine(r), Ok(r));
        assert_eq!(
            AccessMode::ExecuteOnWrite.combine(AccessMode::ExecuteOnWrite),
            Ok(AccessMode::ExecuteOnWrite)
        );
    }

    #[test]
    fn execute_on_write_is_noncomposable() {
        let r = AccessMode::Mask(MemoryAccess::R);
        assert_eq!(AccessMode::ExecuteOnWrite.combine(r), Err(Invalid));
        assert_eq!(r.combine(AccessMode::ExecuteOnWrite), Err(Invalid));
    }

    #[test]
    fn masks_union() {
        let r = AccessMode::Mask(MemoryAccess::R);
        let w = AccessMode::Mask(MemoryAccess::W);
        assert_eq!(r.combine(w), Ok(AccessMode::Mask(MemoryAccess::RW)));
    }
}
