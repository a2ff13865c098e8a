/// Offsets needed to walk a Linux kernel's process list.
///
/// Every field is optional: a config block need not set all of them, and an
/// unset field simply means the corresponding introspection operation will
/// fail with `Unsupported` rather than guessing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinuxOffsets {
    /// Offset of `init_task` relative to the kernel base, or its address.
    pub tasks: Option<u64>,

    /// Offset of `mm_struct` within `task_struct`.
    pub mm: Option<u64>,

    /// Offset of the process name (`comm`) within `task_struct`.
    pub name: Option<u64>,

    /// Offset of the PID within `task_struct`.
    pub pid: Option<u64>,

    /// Offset of the page global directory within `mm_struct`.
    pub pgd: Option<u64>,

    /// Offset used when resolving addresses within `mm_struct`.
    pub addr: Option<u64>,
}

/// Offsets needed to walk a Windows kernel's process list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WindowsOffsets {
    /// Base address of `ntoskrnl.exe`.
    pub ntoskrnl: Option<u64>,

    /// Offset of `PsActiveProcessHead`/`ActiveProcessLinks`.
    pub tasks: Option<u64>,

    /// Offset of the directory table base (`DirectoryTableBase`) within
    /// `KPROCESS`.
    pub pdbase: Option<u64>,

    /// Offset of `UniqueProcessId` within `EPROCESS`.
    pub pid: Option<u64>,

    /// Offset of the Process Environment Block within `EPROCESS`.
    pub peb: Option<u64>,

    /// Offset of the image base address within `EPROCESS`.
    pub iba: Option<u64>,

    /// Offset of the process handle table within `EPROCESS`.
    pub ph: Option<u64>,

    /// Offset of the image file name (`ImageFileName`) within `EPROCESS`.
    pub pname: Option<u64>,

    /// Offset of `KdVersionBlock`.
    pub kdvb: Option<u64>,

    /// Offset of `PsInitialSystemProcess`.
    pub sysproc: Option<u64>,
}

/// The detected or declared guest operating system type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsType {
    /// A Linux guest.
    Linux,

    /// A Windows guest.
    Windows,
}

/// A single VM's configuration block: `name { key = value; ... }`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// The `ostype` key, if present.
    pub ostype: Option<OsType>,

    /// The `sysmap` key (path to a Linux System.map file), if present.
    pub sysmap: Option<String>,

    /// Linux-specific offsets.
    pub linux: LinuxOffsets,

    /// Windows-specific offsets.
    pub windows: WindowsOffsets,
}

/// A parsed configuration file: one [`VmConfig`] per named VM block.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    entries: std::collections::HashMap<String, VmConfig>,
}

impl ConfigFile {
    /// Looks up the configuration block for `name`.
    pub fn get(&self, name: &str) -> Option<&VmConfig> {
        self.entries.get(name)
    }

    /// Iterates over every `(name, config)` pair in the file.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VmConfig)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn insert(&mut self, name: String, config: VmConfig) {
        self.entries.insert(name, config);
    }
}
