//! Load flags and privacy mode, mirroring `net/base/load_flags.h` and
//! `net/base/privacy_mode.h`.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit set of per-request load flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LoadFlags(u32);

impl LoadFlags {
    pub const NORMAL: LoadFlags = LoadFlags(0);
    pub const DO_NOT_SAVE_COOKIES: LoadFlags = LoadFlags(1 << 7);
    pub const DO_NOT_SEND_COOKIES: LoadFlags = LoadFlags(1 << 8);
    pub const DO_NOT_SEND_AUTH_DATA: LoadFlags = LoadFlags(1 << 9);

    /// Flags used for a connection that must not carry credentials.
    pub const fn without_credentials() -> Self {
        LoadFlags(
            Self::DO_NOT_SEND_COOKIES.0
                | Self::DO_NOT_SAVE_COOKIES.0
                | Self::DO_NOT_SEND_AUTH_DATA.0,
        )
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: LoadFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for LoadFlags {
    type Output = LoadFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        LoadFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for LoadFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for LoadFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoadFlags({:#x})", self.0)
    }
}

/// Whether a connection is partitioned away from credentialed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrivacyMode {
    #[default]
    Disabled,
    Enabled,
}

impl PrivacyMode {
    pub fn is_enabled(self) -> bool {
        self == PrivacyMode::Enabled
    }
}

/// Load flags and privacy mode for a preconnect with or without credentials.
pub fn connection_flags(allow_credentials: bool) -> (LoadFlags, PrivacyMode) {
    if allow_credentials {
        (LoadFlags::NORMAL, PrivacyMode::Disabled)
    } else {
        (LoadFlags::without_credentials(), PrivacyMode::Enabled)
    }
}
