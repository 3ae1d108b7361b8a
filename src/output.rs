use serde_json::json;

use crate::error::CompileError;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Message sink for both humans and CI systems. Human mode prefixes
/// lines with ✓/✗/ℹ and colors them unless `NO_COLOR` is set; CI mode
/// emits one JSON object per line.
pub struct Printer {
    ci: bool,
    color: bool,
}

impl Printer {
    /// `color_never` comes from the user config (`output.color = "never"`);
    /// `NO_COLOR` wins regardless.
    pub fn new(ci: bool, color_never: bool) -> Self {
        Self {
            ci,
            color: !ci && !color_never && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    pub fn success(&self, message: &str) {
        if self.ci {
            self.ci_line("info", message);
        } else {
            println!("{}✓ {message}{}", self.paint(GREEN), self.paint(RESET));
        }
    }

    pub fn info(&self, message: &str) {
        if self.ci {
            self.ci_line("info", message);
        } else {
            println!("{}ℹ {message}{}", self.paint(CYAN), self.paint(RESET));
        }
    }

    pub fn warn(&self, message: &str) {
        if self.ci {
            self.ci_line("warning", message);
        } else {
            eprintln!("{}ℹ {message}{}", self.paint(CYAN), self.paint(RESET));
        }
    }

    pub fn error(&self, message: &str) {
        if self.ci {
            self.ci_line("error", message);
        } else {
            eprintln!("{}✗ {message}{}", self.paint(RED), self.paint(RESET));
        }
    }

    /// Render a compile error: every diagnostic with its machine code,
    /// manifest path and remediation hint.
    pub fn compile_error(&self, error: &CompileError) {
        for diagnostic in error.diagnostics() {
            if self.ci {
                let line = json!({
                    "level": "error",
                    "code": diagnostic.code,
                    "path": diagnostic.path,
                    "message": diagnostic.message,
                    "hint": diagnostic.hint,
                });
                println!("{line}");
            } else {
                eprintln!(
                    "{}✗ [{}] {}{}",
                    self.paint(RED),
                    diagnostic.code,
                    diagnostic.message,
                    self.paint(RESET)
                );
                if !diagnostic.path.is_empty() {
                    eprintln!("    at {}", diagnostic.path);
                }
                eprintln!("    hint: {}", diagnostic.hint);
            }
        }
    }

    fn ci_line(&self, level: &str, message: &str) {
        let line = json!({
            "level": level,
            "message": message,
            "context": {},
        });
        println!("{line}");
    }

    fn paint(&self, code: &'static str) -> &'static str {
        if self.color { code } else { "" }
    }
}
