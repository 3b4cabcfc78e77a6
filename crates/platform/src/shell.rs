//! Login shell detection

use std::env;

/// Detect the user's login shell.
///
/// Checks `$SHELL` (and `$COMSPEC` on Windows), falling back to the
/// platform's default shell.
pub fn login_shell() -> String {
    if let Ok(shell) = env::var("SHELL")
        && !shell.trim().is_empty()
    {
        return shell;
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(comspec) = env::var("COMSPEC") {
            return comspec;
        }
        "powershell.exe".to_string()
    }

    #[cfg(not(target_os = "windows"))]
    "/bin/sh".to_string()
}
