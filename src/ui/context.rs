//! Where command output goes: a terminal, a GitHub Actions log, or a plain log

use std::io::IsTerminal;

/// Output mode of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiContext {
    /// Interactive terminal, rendered with cliclack
    interactive: bool,
    /// Running under GitHub Actions, which understands `::warning::` and `::group::`
    annotations: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        let annotations = std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true");
        Self {
            interactive: !annotations && Self::detect_interactive(),
            annotations,
        }
    }

    /// Plain lines, no annotations
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            annotations: false,
        }
    }

    /// Plain lines with workflow commands
    #[cfg(test)]
    pub fn github_actions() -> Self {
        Self {
            interactive: false,
            annotations: true,
        }
    }

    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }

    /// Whether warnings and failures are emitted as workflow annotations
    pub fn annotations(&self) -> bool {
        self.annotations
    }

    fn detect_interactive() -> bool {
        if !std::io::stdout().is_terminal() {
            return false;
        }

        // Some runners wrap the job in a TTY
        let ci_vars = ["CI", "RUNS_ON_RUNNER_NAME"];
        !ci_vars.iter().any(|var| std::env::var_os(var).is_some())
    }
}
