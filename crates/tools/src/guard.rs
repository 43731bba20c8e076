//! Path validation shared by the file tools.

use std::path::{Component, Path};

/// Path prefixes no tool may touch, regardless of configuration.
pub const DEFAULT_FORBIDDEN: &[&str] = &[
    "/etc/shadow",
    "/etc/passwd",
    "/etc/sudoers",
    "~/.ssh",
    "~/.aws",
    "~/.gnupg",
];

/// Validate a path against traversal and forbidden prefixes.
///
/// `..` components are rejected outright rather than resolved; the tools
/// operate on editor-supplied workspaces where an upward escape is never a
/// legitimate request.
pub fn validate_path(path: &str, forbidden: &[String]) -> Result<(), String> {
    if Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(format!("path '{path}' contains a parent-directory component"));
    }

    let expanded = expand_home(path);
    for prefix in DEFAULT_FORBIDDEN {
        if expanded.starts_with(&expand_home(prefix)) {
            return Err(format!("path '{path}' is in a protected location"));
        }
    }
    for prefix in forbidden {
        if expanded.starts_with(&expand_home(prefix)) {
            return Err(format!("path '{path}' is in a forbidden location"));
        }
    }
    Ok(())
}

fn expand_home(path: &str) -> String {
    match path.strip_prefix("~") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            format!("{home}{rest}")
        }
        None => path.to_string(),
    }
}
