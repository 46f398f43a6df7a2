//! Result lines of the cache commands
//!
//! Under GitHub Actions warnings and failures become workflow annotations,
//! so a cold or broken cache shows up on the job summary, and each mount
//! point gets a collapsible log group.

use super::context::UiContext;
use console::style;

/// Title shown on workflow annotations
const ANNOTATION_TITLE: &str = "warmvol";

/// Display intro banner
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else if !ctx.annotations() {
        println!("{}", style(title).cyan().bold());
    }
}

/// Display success outro
pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!("{} {}", style("[OK]").green(), message);
    }
}

/// Open a log group for one mount point; plain and terminal output ignore it
pub fn group(ctx: &UiContext, title: &str) {
    if ctx.annotations() {
        println!("::group::{}", escape_data(title));
    }
}

/// Close the group opened by [`group`]
pub fn end_group(ctx: &UiContext) {
    if ctx.annotations() {
        println!("::endgroup::");
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(message).ok();
    } else {
        println!("  {} {}", style("[OK]").green(), message);
    }
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(format!("{} ({})", message, style(detail).dim())).ok();
    } else {
        println!("  {} {} ({})", style("[OK]").green(), message, detail);
    }
}

/// Warning with a hint; a workflow warning under GitHub Actions
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(format!("{} - {}", message, style(hint).dim())).ok();
    } else if ctx.annotations() {
        println!("{}", annotation("warning", &format!("{} - {}", message, hint)));
    } else {
        println!("  {} {} - {}", style("[WARN]").yellow(), message, hint);
    }
}

/// Failure of one item; a workflow error under GitHub Actions
pub fn step_error_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::error(format!("{}: {}", message, style(detail).red())).ok();
    } else if ctx.annotations() {
        println!("{}", annotation("error", &format!("{}: {}", message, detail)));
    } else {
        println!("  {} {}: {}", style("[FAIL]").red(), message, detail);
    }
}

pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(message).ok();
    } else {
        println!("  {} {}", style("[INFO]").cyan(), message);
    }
}

pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

/// Print styled key-value pair
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// `::level title=warmvol::message` workflow command
fn annotation(level: &str, message: &str) -> String {
    format!("::{} title={}::{}", level, ANNOTATION_TITLE, escape_data(message))
}

/// Escape a workflow command's data so it stays on one line
fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_does_not_panic() {
        for ctx in [UiContext::non_interactive(), UiContext::github_actions()] {
            intro(&ctx, "warmvol restore");
            group(&ctx, "/var/lib/docker");
            step_ok_detail(&ctx, "/var/lib/docker restored", "cloned from snap-0abc");
            step_warn_hint(&ctx, "No usable snapshot", "the next restore starts from a blank volume");
            key_value(&ctx, "volume", "vol-0abc");
            end_group(&ctx);
            outro_success(&ctx, "Cache volumes ready");
        }
    }

    #[test]
    fn annotations_stay_on_one_line() {
        assert_eq!(
            annotation("error", "/var/cache/apt: umount failed\ntarget is busy (100%)"),
            "::error title=warmvol::/var/cache/apt: umount failed%0Atarget is busy (100%25)"
        );
        assert_eq!(
            annotation("warning", "No usable snapshot - blank volume"),
            "::warning title=warmvol::No usable snapshot - blank volume"
        );
    }
}
