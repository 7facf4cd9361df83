//! Debug verbosity bitmask.
//!
//! Read once per executive from the `SKYFRAME_DEBUG` environment variable.
//! Each bit enables one class of `tracing` diagnostics:
//!
//! | bit | value | class                                   |
//! |-----|-------|-----------------------------------------|
//! | 0   | 1     | startup and load messages               |
//! | 1   | 2     | instantiation / destruction traces      |
//! | 2   | 4     | per-frame trace                         |
//! | 3   | 8     | runtime state dumps                     |
//! | 4   | 16    | sanity-check warnings inside models     |

/// Environment variable holding the bitmask.
pub const DEBUG_ENV_VAR: &str = "SKYFRAME_DEBUG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugLevel(u32);

impl DebugLevel {
    /// Nothing but errors.
    pub const SILENT: DebugLevel = DebugLevel(0);
    /// Startup messages only; used when the variable is unset.
    pub const BASELINE: DebugLevel = DebugLevel(1);

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Read [`DEBUG_ENV_VAR`], falling back to [`DebugLevel::BASELINE`].
    pub fn from_env() -> Self {
        Self::parse(std::env::var(DEBUG_ENV_VAR).ok().as_deref())
    }

    /// Parse a raw variable value. Unset or unparsable gives the baseline.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|v| v.trim().parse::<u32>().ok())
            .map(Self)
            .unwrap_or(Self::BASELINE)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn startup(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn instantiation(self) -> bool {
        self.0 & 2 != 0
    }

    pub fn frame_trace(self) -> bool {
        self.0 & 4 != 0
    }

    pub fn runtime_state(self) -> bool {
        self.0 & 8 != 0
    }

    pub fn sanity(self) -> bool {
        self.0 & 16 != 0
    }
}

impl Default for DebugLevel {
    fn default() -> Self {
        Self::BASELINE
    }
}
