//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 2       | Universal        | CLI usage error (bad args)               |
//! | 60-69   | recon            | Reconciliation run / summarize codes     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Recon (60-69)
// =============================================================================

/// Config could not be read, parsed, or failed validation.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 60;

/// An input file (catalog, mapping, detection database, reviewed CSV)
/// could not be read or parsed.
pub const EXIT_RECON_INPUT: u8 = 61;

/// A report or JSON summary could not be rendered or written.
pub const EXIT_RECON_WRITE: u8 = 62;

/// Review items found and `--fail-on-review` was given.
pub const EXIT_RECON_REVIEW: u8 = 63;
