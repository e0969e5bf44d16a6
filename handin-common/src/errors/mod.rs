//! Error catalog and definitions for the handin portal
//!
//! Every user-facing failure carries a unique code so that a student's
//! screenshot of an error page can be traced back to its cause.
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                          |
//! |------------|-------------|--------------------------------------|
//! | E001-E099  | Config      | Configuration and startup errors     |
//! | E100-E199  | Validation  | Submission form validation           |
//! | E200-E299  | Network     | Reachability probes (advisory)       |
//! | E300-E399  | Auth        | Identity provider and session        |
//! | E400-E499  | Store       | Spreadsheet store reads and writes   |
//! | E500-E599  | Internal    | Internal/unexpected errors           |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};
