/*!
 * Limits and Constants
 *
 * Centralized location for protocol bounds and distinguished exit statuses.
 */

// =============================================================================
// MESSAGE FRAMING
// =============================================================================

/// Maximum record length on the wire, terminator included (4KB)
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Maximum content bytes per record (terminator excluded)
pub const MAX_MESSAGE_CONTENT: usize = MAX_MESSAGE_LEN - 1;

/// Record terminator
pub const MESSAGE_TERMINATOR: u8 = b'\n';

// =============================================================================
// EXIT STATUSES
// =============================================================================

/// Exit status for success
pub const EXIT_SUCCESS: i32 = 0;

/// Generic failure status for internal roles (worker I/O failure, bad data)
pub const EXIT_FAILURE: i32 = 1;

/// Exit status when a stage command was found but could not be run,
/// or a kept endpoint could not be rebound onto a standard stream
/// [LINUX-COMPAT] Matches the shell convention
pub const EXEC_FAILED_STATUS: i32 = 126;

/// Exit status when a stage command could not be located on PATH
/// [LINUX-COMPAT] Matches the shell convention
pub const EXEC_NOT_FOUND_STATUS: i32 = 127;

/// Exit status for a child whose task panicked
pub const PANIC_STATUS: i32 = 101;

/// Base added to the signal number for signal-terminated children
/// [LINUX-COMPAT] Matches the shell convention
pub const SIGNAL_STATUS_BASE: i32 = 128;

/// Recorded code for a handle whose wait failed
pub const REAP_FAILURE_STATUS: i32 = -1;
