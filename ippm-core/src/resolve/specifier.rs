use std::path::Path;

const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BareSpecifier<'a> {
    pub name: &'a str,
    pub subpath: Option<&'a str>,
}

pub fn is_builtin(specifier: &str) -> bool {
    if specifier.starts_with("node:") {
        return true;
    }

    let head = specifier.split('/').next().unwrap_or(specifier);
    BUILTIN_MODULES.contains(&head)
}

pub fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Specifiers the host resolves on its own.
pub fn is_pass_through(specifier: &str) -> bool {
    is_builtin(specifier) || is_relative(specifier) || Path::new(specifier).is_absolute()
}

/// `name[/subpath]`, where a scoped name spans two segments.
pub fn parse(specifier: &str) -> Option<BareSpecifier<'_>> {
    if specifier.is_empty() {
        return None;
    }

    let name_end = if specifier.starts_with('@') {
        let scope_end = specifier.find('/')?;
        specifier[scope_end + 1..]
            .find('/')
            .map(|i| scope_end + 1 + i)
            .unwrap_or(specifier.len())
    } else {
        specifier.find('/').unwrap_or(specifier.len())
    };

    let name = &specifier[..name_end];
    if name.is_empty() || name.ends_with('/') {
        return None;
    }

    let subpath = specifier
        .get(name_end + 1..)
        .filter(|rest| !rest.is_empty());

    Some(BareSpecifier { name, subpath })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_name_and_subpath() {
        assert_eq!(
            parse("lodash/fp/map"),
            Some(BareSpecifier {
                name: "lodash",
                subpath: Some("fp/map")
            })
        );
        assert_eq!(
            parse("lodash"),
            Some(BareSpecifier {
                name: "lodash",
                subpath: None
            })
        );
        assert_eq!(
            parse("lodash/"),
            Some(BareSpecifier {
                name: "lodash",
                subpath: None
            })
        );
    }

    #[test]
    fn keeps_scope_in_name() {
        assert_eq!(
            parse("@babel/core/lib/index"),
            Some(BareSpecifier {
                name: "@babel/core",
                subpath: Some("lib/index")
            })
        );
        assert_eq!(parse("@babel"), None);
    }

    #[test]
    fn recognizes_host_owned_specifiers() {
        assert!(is_pass_through("fs"));
        assert!(is_pass_through("fs/promises"));
        assert!(is_pass_through("node:test"));
        assert!(is_pass_through("./x"));
        assert!(is_pass_through("../x"));
        assert!(is_pass_through("/abs/x.js"));
        assert!(!is_pass_through("left-pad"));
        assert!(!is_pass_through(".hidden"));
    }
}
