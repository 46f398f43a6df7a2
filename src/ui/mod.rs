//! Command output
//!
//! Uses `cliclack` in an interactive terminal, workflow commands under
//! GitHub Actions, and plain `[OK]`-style lines everywhere else. Progress
//! of the cache pipeline itself goes through `tracing`; this module only
//! prints command results.

mod context;
mod output;

pub use context::UiContext;
pub use output::{
    end_group, group, intro, key_value, outro_success, remark, step_error_detail, step_info,
    step_ok, step_ok_detail, step_warn_hint,
};
