//! Host command translation.
//!
//! Models overwhelmingly emit POSIX shell commands. When the host is
//! Windows (cmd.exe), the leading command word is rewritten to its closest
//! equivalent before execution. Translation is injected as a trait so the
//! embedding editor can supply its own mapping or disable it entirely.

/// Rewrites a shell command for the host platform.
pub trait CommandTranslator: Send + Sync {
    fn translate(&self, command: &str) -> String;
}

/// Pass-through translator for POSIX hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTranslator;

impl CommandTranslator for NoopTranslator {
    fn translate(&self, command: &str) -> String {
        command.to_string()
    }
}

/// POSIX-to-cmd.exe command word mapping. Only the first word is
/// rewritten; arguments pass through untouched, which is wrong for flag
/// syntax but right often enough to be useful.
const WINDOWS_MAP: &[(&str, &str)] = &[
    ("ls", "dir"),
    ("cat", "type"),
    ("rm", "del"),
    ("cp", "copy"),
    ("mv", "move"),
    ("mkdir", "mkdir"),
    ("pwd", "cd"),
    ("clear", "cls"),
    ("touch", "type nul >"),
    ("grep", "findstr"),
    ("which", "where"),
    ("head", "more"),
    ("tail", "more"),
];

/// Translator for Windows hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsTranslator;

impl CommandTranslator for WindowsTranslator {
    fn translate(&self, command: &str) -> String {
        let trimmed = command.trim();
        let Some(word) = trimmed.split_whitespace().next() else {
            return command.to_string();
        };
        match WINDOWS_MAP.iter().find(|(posix, _)| *posix == word) {
            Some((_, replacement)) => {
                let rest = trimmed[word.len()..].trim_start();
                if rest.is_empty() {
                    (*replacement).to_string()
                } else {
                    format!("{replacement} {rest}")
                }
            }
            None => command.to_string(),
        }
    }
}

/// The translator matching the compile-time target.
pub fn platform_default() -> Box<dyn CommandTranslator> {
    #[cfg(windows)]
    {
        Box::new(WindowsTranslator)
    }
    #[cfg(not(windows))]
    {
        Box::new(NoopTranslator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_passes_through() {
        assert_eq!(NoopTranslator.translate("ls -la"), "ls -la");
    }

    #[test]
    fn windows_rewrites_command_word() {
        let t = WindowsTranslator;
        assert_eq!(t.translate("ls -la src"), "dir -la src");
        assert_eq!(t.translate("cat README.md"), "type README.md");
        assert_eq!(t.translate("grep TODO src/main.rs"), "findstr TODO src/main.rs");
    }

    #[test]
    fn windows_leaves_unknown_commands() {
        let t = WindowsTranslator;
        assert_eq!(t.translate("cargo build"), "cargo build");
        assert_eq!(t.translate(""), "");
    }

    #[test]
    fn windows_bare_command() {
        assert_eq!(WindowsTranslator.translate("pwd"), "cd");
        assert_eq!(WindowsTranslator.translate("clear"), "cls");
    }
}
