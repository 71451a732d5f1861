//! Hart/mode topology descriptors.
//!
//! A descriptor lists one group of mode letters per hart, separated by `,`:
//!
//! - `"M"`: 1 hart with M mode
//! - `"MS,MS"`: 2 harts, 0-1 with M and S mode
//! - `"M,MS,MS,MS,MS"`: 5 harts, 0 with M mode, 1-4 with M and S mode
//!
//! Every letter becomes one addressable context, numbered in the order the
//! letters appear.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use axerrno::{AxError, AxResult};
use bitmaps::Bitmap;

/// Privilege mode of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PlicMode {
    User = 0,
    Supervisor = 1,
    Hypervisor = 2,
    Machine = 3,
}

impl PlicMode {
    pub const fn as_char(self) -> char {
        match self {
            PlicMode::User => 'U',
            PlicMode::Supervisor => 'S',
            PlicMode::Hypervisor => 'H',
            PlicMode::Machine => 'M',
        }
    }
}

impl TryFrom<char> for PlicMode {
    type Error = AxError;

    fn try_from(c: char) -> AxResult<Self> {
        match c {
            'U' => Ok(PlicMode::User),
            'S' => Ok(PlicMode::Supervisor),
            'H' => Ok(PlicMode::Hypervisor),
            'M' => Ok(PlicMode::Machine),
            _ => Err(AxError::InvalidInput),
        }
    }
}

impl fmt::Display for PlicMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One addressable (hart, mode) interrupt target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlicContext {
    /// Index of this context in the enable and context register windows.
    pub addr_id: usize,
    pub hart_id: usize,
    pub mode: PlicMode,
}

impl fmt::Display for PlicContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hart{}-{}", self.hart_id, self.mode)
    }
}

/// Parses a hart/mode descriptor into its ordered list of contexts.
///
/// Unknown mode letters and a letter repeated within one hart's group are
/// configuration errors.
pub fn parse_hart_config(config: &str) -> AxResult<Vec<PlicContext>> {
    let mut contexts = Vec::new();
    let mut hart_id = 0;
    let mut modes = Bitmap::<4>::new();

    for c in config.chars() {
        if c == ',' {
            hart_id += 1;
            modes = Bitmap::new();
            continue;
        }
        let mode = match PlicMode::try_from(c) {
            Ok(mode) => mode,
            Err(err) => {
                error!("plic: invalid mode '{c}' in config: {config}");
                return Err(err);
            }
        };
        if modes.set(mode as usize, true) {
            error!("plic: duplicate mode '{c}' in config: {config}");
            return Err(AxError::InvalidInput);
        }
        contexts.push(PlicContext {
            addr_id: contexts.len(),
            hart_id,
            mode,
        });
    }

    Ok(contexts)
}

/// Builds a descriptor giving each of `harts` harts the same mode `group`.
pub fn hart_config_for(harts: usize, group: &str) -> String {
    let mut config = String::with_capacity((group.len() + 1) * harts);
    for i in 0..harts {
        if i != 0 {
            config.push(',');
        }
        config.push_str(group);
    }
    config
}
