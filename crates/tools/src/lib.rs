//! Built-in tool implementations for Tiller.
//!
//! These give the assistant its hands inside the editor's world: run shell
//! commands, read and write files, list directories. The host can register
//! additional tools on top of this set.

pub mod command_shim;
pub mod file_read;
pub mod file_write;
pub mod guard;
pub mod list_files;
pub mod shell;

use std::sync::Arc;

use tiller_core::tool::ToolRegistry;

pub use command_shim::{platform_default, CommandTranslator, NoopTranslator, WindowsTranslator};

/// The default shell allowlist: common read-mostly commands plus the usual
/// build tooling.
pub fn default_shell_allowlist() -> Vec<String> {
    [
        "ls", "dir", "cat", "type", "head", "tail", "echo", "pwd", "cd", "date",
        "whoami", "wc", "grep", "findstr", "find", "which", "where", "git",
        "cargo", "rustc", "node", "npm", "python", "pip",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Create a registry with all built-in tools.
///
/// Security defaults:
/// - Shell: only the commands in `allowlist` (empty = allow all)
/// - File read/write: sensitive paths (~/.ssh, /etc/shadow, ...) are blocked
pub fn default_registry(allowlist: Vec<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    // The built-in names never collide; register cannot fail here.
    let _ = registry.register(Arc::new(shell::ShellTool::new(allowlist)));
    let _ = registry.register(Arc::new(file_read::FileReadTool::new()));
    let _ = registry.register(Arc::new(file_write::FileWriteTool::new()));
    let _ = registry.register(Arc::new(list_files::ListFilesTool));
    registry
}
