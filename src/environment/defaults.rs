//! Baseline session environment.
//!
//! Fills the XDG base directories when the login manager did not, and
//! advertises the desktop name.

use super::EnvironmentMap;

/// Environment inherited from the current process (non-UTF-8 entries skipped).
pub fn inherited() -> EnvironmentMap {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Applies the session defaults to `env`.
///
/// XDG base directories are only set when missing or empty; desktop identity
/// variables are always overwritten with `desktop`.
pub fn apply(env: &mut EnvironmentMap, desktop: &str) {
    let home = env.get("HOME").cloned().unwrap_or_default();

    set_if_empty(env, "XDG_DATA_HOME", format!("{home}/.local/share"));
    set_if_empty(env, "XDG_CONFIG_HOME", format!("{home}/.config"));
    set_if_empty(env, "XDG_CACHE_HOME", format!("{home}/.cache"));
    set_if_empty(env, "XDG_DATA_DIRS", "/usr/local/share/:/usr/share/".to_string());
    set_if_empty(env, "XDG_CONFIG_DIRS", "/etc/xdg".to_string());

    env.insert("DESKTOP_SESSION".to_string(), desktop.to_string());
    env.insert("XDG_CURRENT_DESKTOP".to_string(), desktop.to_string());
    env.insert("XDG_SESSION_DESKTOP".to_string(), desktop.to_string());
}

fn set_if_empty(env: &mut EnvironmentMap, key: &str, value: String) {
    let missing = env.get(key).is_none_or(|v| v.is_empty());
    if missing {
        env.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_only_missing_directories() {
        let mut env = EnvironmentMap::new();
        env.insert("HOME".into(), "/home/ada".into());
        env.insert("XDG_CONFIG_HOME".into(), "/cfg".into());
        env.insert("XDG_CACHE_HOME".into(), String::new());

        apply(&mut env, "sessionvisor");

        assert_eq!(env["XDG_DATA_HOME"], "/home/ada/.local/share");
        assert_eq!(env["XDG_CONFIG_HOME"], "/cfg");
        assert_eq!(env["XDG_CACHE_HOME"], "/home/ada/.cache");
        assert_eq!(env["XDG_CONFIG_DIRS"], "/etc/xdg");
        assert_eq!(env["XDG_CURRENT_DESKTOP"], "sessionvisor");
    }
}
