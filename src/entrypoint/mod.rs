//! Entry-point wrapper
//!
//! The generated wrapper loads the user script, enforces the `main()` contract,
//! and reports through a fixed set of exit statuses:
//!
//! | exit | meaning                                   |
//! |------|-------------------------------------------|
//! | 0    | success, stdout holds exactly the JSON    |
//! | 10   | script top-level code raised              |
//! | 11   | no callable `main` after loading          |
//! | 12   | `main()` raised                           |
//! | 13   | return value is not JSON-serializable     |

pub mod python;

use serde::{Deserialize, Serialize};

/// File name of the user script inside a workspace
pub const SCRIPT_FILE: &str = "script.py";

/// File name of the generated wrapper inside a workspace
pub const WRAPPER_FILE: &str = "wrapper.py";

/// Exit conditions of the generated wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapperExit {
    Success,
    LoadFailed,
    MissingEntryPoint,
    InvocationFailed,
    NotSerializable,
}

impl WrapperExit {
    pub fn code(self) -> i32 {
        match self {
            WrapperExit::Success => 0,
            WrapperExit::LoadFailed => 10,
            WrapperExit::MissingEntryPoint => 11,
            WrapperExit::InvocationFailed => 12,
            WrapperExit::NotSerializable => 13,
        }
    }

    /// Map a process exit status back to a wrapper exit condition.
    /// Statuses the wrapper never produces (sandbox failures, rlimit kills) map to `None`.
    pub fn from_code(code: i32) -> Option<WrapperExit> {
        match code {
            0 => Some(WrapperExit::Success),
            10 => Some(WrapperExit::LoadFailed),
            11 => Some(WrapperExit::MissingEntryPoint),
            12 => Some(WrapperExit::InvocationFailed),
            13 => Some(WrapperExit::NotSerializable),
            _ => None,
        }
    }
}
