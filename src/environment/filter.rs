//! Export filtering applied before fan-out.

use super::EnvironmentMap;

/// Variables that only make sense inside the originating login session.
///
/// They stay in the local map (spawned children inherit them) but never cross
/// to a sink.
pub const SESSION_LOCAL_KEYS: [&str; 6] = [
    "XDG_SEAT",
    "XDG_SESSION_CLASS",
    "XDG_SESSION_DESKTOP",
    "XDG_SESSION_ID",
    "XDG_SESSION_TYPE",
    "XDG_VTNR",
];

const SHELL_FUNCTION_KEY: &str = "BASH_FUNC";
const SHELL_FUNCTION_VALUE: &str = "() {";

/// True if `key=value` may be pushed to a sink.
pub fn is_exportable(key: &str, value: &str) -> bool {
    !SESSION_LOCAL_KEYS.contains(&key)
        && !key.starts_with(SHELL_FUNCTION_KEY)
        && !value.trim_start().starts_with(SHELL_FUNCTION_VALUE)
}

/// Copy of `map` without session-local variables and shell function definitions.
pub fn exportable(map: &EnvironmentMap) -> EnvironmentMap {
    map.iter()
        .filter(|(k, v)| is_exportable(k, v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_session_local_and_function_definitions() {
        let map: EnvironmentMap = [
            ("LANG", "it_IT.UTF-8"),
            ("XDG_SESSION_ID", "3"),
            ("XDG_VTNR", "2"),
            ("BASH_FUNC_module%%", "() {  eval stuff\n}"),
            ("EVIL", "() { :; }; rm -rf ~"),
            ("PATH", "/usr/bin"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let out = exportable(&map);
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["LANG", "PATH"]);
    }

    #[test]
    fn ordinary_values_with_parentheses_pass() {
        assert!(is_exportable("PS1", "(\\u) $ "));
    }
}
