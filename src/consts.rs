// Default register geometry follows the SiFive PLIC memory map (riscv-plic-1.0.0).
// A PlicConfig may relocate every window; these are only the defaults.

/// Largest source count a configuration may ask for, source 0 included.
pub const PLIC_MAX_SOURCES: usize = 1024;

// --- Default window offsets (relative to the aperture start) ---

/// Priority of source N lives at `PLIC_PRIORITY_OFFSET + N * 4`.
pub const PLIC_PRIORITY_OFFSET: usize = 0x000000;

/// Pending word W covers sources [W*32, W*32+31].
pub const PLIC_PENDING_OFFSET: usize = 0x001000;

/// Enable words of context C start at `PLIC_ENABLE_OFFSET + C * PLIC_ENABLE_STRIDE`.
pub const PLIC_ENABLE_OFFSET: usize = 0x002000;

/// Room for 32 enable words (1024 sources) per context.
pub const PLIC_ENABLE_STRIDE: usize = 0x80;

/// Threshold and claim/complete of context C start at
/// `PLIC_CONTEXT_CTRL_OFFSET + C * PLIC_CONTEXT_STRIDE`.
pub const PLIC_CONTEXT_CTRL_OFFSET: usize = 0x200000;

/// One 4K page per context, of which only the first 8 bytes are registers.
pub const PLIC_CONTEXT_STRIDE: usize = 0x1000;

/// Threshold register, inside a context's block.
pub const PLIC_CONTEXT_THRESHOLD_OFFSET: usize = 0x00;

/// Claim (read) / complete (write) register, inside a context's block.
pub const PLIC_CONTEXT_CLAIM_COMPLETE_OFFSET: usize = 0x04;

/// Size of the whole register aperture.
pub const PLIC_APERTURE_SIZE: usize = 0x4000000;

// --- Board defaults ---

/// Sources wired on the reference board, source 0 included.
pub const PLIC_DEFAULT_NUM_SOURCES: u32 = 127;

/// Highest priority level on the reference board.
pub const PLIC_DEFAULT_NUM_PRIORITIES: u32 = 7;

/// Per-hart mode group used by the reference board.
pub const PLIC_DEFAULT_HART_GROUP: &str = "MS";

// --- mip bits driven by the output lines ---

/// Supervisor external interrupt pending.
pub const MIP_SEIP: usize = 1 << 9;

/// Machine external interrupt pending.
pub const MIP_MEIP: usize = 1 << 11;
