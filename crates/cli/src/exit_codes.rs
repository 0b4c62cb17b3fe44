//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (e.g. a URL that does not normalize)   |
//! | 2    | CLI usage error (bad args; emitted by clap)          |
//! | 3    | Config could not be parsed or failed validation      |
//! | 4    | Runtime error (unreadable file, missing column, ...) |
//! | 5    | Discrepancies found and `--strict` was given         |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant with the next free value
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use seoaudit_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// clap exits with this code on its own.
#[allow(dead_code)]
pub const EXIT_USAGE: u8 = 2;

/// Config TOML is malformed or fails validation.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 3;

/// Run failed after the config was accepted: unreadable or malformed CSV,
/// missing column, both sources empty, unwritable output.
pub const EXIT_RECON_RUNTIME: u8 = 4;

/// `--strict`: unmatched URLs or differing field values were found.
pub const EXIT_RECON_DISCREPANCIES: u8 = 5;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::MissingColumn { .. }
        | ReconError::EmptyInput
        | ReconError::RaggedRow { .. }
        | ReconError::Cancelled
        | ReconError::Io(_) => EXIT_RECON_RUNTIME,
    }
}
