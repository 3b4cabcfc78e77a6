//! Path expansion for manifest values

use crate::error::PlatformError;
use std::path::{Component, Path, PathBuf};

/// Expand a manifest path.
///
/// - A leading `~` (alone or followed by a separator) becomes the home directory
/// - `$NAME` and `${NAME}` are replaced with environment variables; `$$` is a literal `$`
/// - When `base` is given, relative results are joined onto it
///
/// The result is normalized lexically; the filesystem is never consulted.
///
/// # Examples
///
/// ```
/// use menv_platform::expand_path;
/// use std::path::Path;
///
/// let path = expand_path("./share/../bin", Some(Path::new("/opt/tool"))).unwrap();
/// assert_eq!(path.to_string_lossy(), "/opt/tool/bin");
/// ```
pub fn expand_path(path: &str, base: Option<&Path>) -> Result<PathBuf, PlatformError> {
    let expanded = expand_vars(path)?;
    let mut result = expand_home(&expanded)?;

    if let Some(base) = base
        && !is_rooted(&result)
    {
        result = base.join(result);
    }
    Ok(normalize_path(&result))
}

fn expand_home(path: &str) -> Result<PathBuf, PlatformError> {
    let Some(rest) = path.strip_prefix('~') else {
        return Ok(PathBuf::from(path));
    };
    if !rest.is_empty() && !rest.starts_with(std::path::is_separator) {
        // `~user` is left alone
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or(PlatformError::NoHomeDirectory)?;
    Ok(home.join(rest.trim_start_matches(std::path::is_separator)))
}

fn expand_vars(path: &str) -> Result<String, PlatformError> {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, tail) = if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
            continue;
        } else if let Some(inner) = after.strip_prefix('{') {
            let end = inner
                .find('}')
                .ok_or_else(|| PlatformError::BadReference(path.to_string()))?;
            (&inner[..end], &inner[end + 1..])
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], &after[end..])
        };

        if name.is_empty() {
            out.push('$');
            rest = after;
            continue;
        }
        let value = std::env::var(name).map_err(|_| PlatformError::UnsetVariable(name.to_string()))?;
        out.push_str(&value);
        rest = tail;
    }
    out.push_str(rest);
    Ok(out)
}

fn is_rooted(path: &Path) -> bool {
    path.is_absolute() || path.has_root()
}

/// Normalize a path by resolving `.` and `..` components without touching the filesystem.
///
/// `..` never climbs above the root of an absolute path.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut kept: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match kept.last() {
                Some(Component::Normal(_)) => {
                    kept.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => kept.push(component),
            },
            other => kept.push(other),
        }
    }

    if kept.is_empty() {
        return PathBuf::from(".");
    }
    kept.iter().collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn home_is_expanded() {
        let home = dirs::home_dir().expect("No home directory");

        assert_eq!(expand_path("~", None).unwrap(), home);
        assert_eq!(expand_path("~/.config/menv", None).unwrap(), home.join(".config/menv"));
        assert_eq!(
            expand_path("~/bin", Some(Path::new("/ignored"))).unwrap(),
            home.join("bin")
        );
    }

    #[test]
    fn tilde_user_is_untouched() {
        assert_eq!(expand_path("~root/x", None).unwrap(), PathBuf::from("~root/x"));
    }

    #[test]
    fn variables_are_substituted() {
        temp_env::with_vars([("MENV_TEST_ROOT", Some("/srv")), ("MENV_TEST_APP", Some("api"))], || {
            assert_eq!(
                expand_path("$MENV_TEST_ROOT/${MENV_TEST_APP}.d", None).unwrap(),
                PathBuf::from("/srv/api.d")
            );
            assert_eq!(
                expand_path("/cost/$$5", None).unwrap(),
                PathBuf::from("/cost/$5")
            );
        });
    }

    #[test]
    fn unset_variable_is_an_error() {
        temp_env::with_var_unset("MENV_TEST_MISSING", || {
            let err = expand_path("$MENV_TEST_MISSING/x", None).unwrap_err();
            assert!(matches!(err, PlatformError::UnsetVariable(ref name) if name == "MENV_TEST_MISSING"));
        });
        assert!(matches!(
            expand_path("${OPEN", None),
            Err(PlatformError::BadReference(_))
        ));
    }

    #[test]
    fn relative_paths_join_base() {
        assert_eq!(
            expand_path("../share/./man", Some(Path::new("/opt/tool/bin"))).unwrap(),
            PathBuf::from("/opt/tool/share/man")
        );
        assert_eq!(
            expand_path("/etc/hosts", Some(Path::new("/opt"))).unwrap(),
            PathBuf::from("/etc/hosts")
        );
        assert_eq!(expand_path("a/b", None).unwrap(), PathBuf::from("a/b"));
    }

    #[test]
    fn normalize_is_lexical() {
        assert_eq!(normalize_path(Path::new("/foo/bar/../baz")), PathBuf::from("/foo/baz"));
        assert_eq!(normalize_path(Path::new("/../etc")), PathBuf::from("/etc"));
        assert_eq!(normalize_path(Path::new("../foo/./bar")), PathBuf::from("../foo/bar"));
        assert_eq!(normalize_path(Path::new("a/..")), PathBuf::from("."));
    }
}
