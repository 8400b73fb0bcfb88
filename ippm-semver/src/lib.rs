use semver::VersionReq;
use std::cmp::Ordering;
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone)]
pub struct RangeSet {
    original: String,
    ranges: Vec<VersionReq>,
}

#[derive(Debug, Clone)]
pub struct Error {
    input: String,
    message: String,
}

impl Error {
    pub fn new(input: String, message: String) -> Self {
        Self { input, message }
    }

    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.input)
    }
}

impl StdError for Error {}

impl RangeSet {
    pub fn parse(original: &str) -> Result<Self, Error> {
        let mut s = original.trim();

        if s.is_empty() || s == "latest" {
            s = "*";
        }

        let mut ranges = Vec::new();

        for part in s.split("||") {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let normalized = normalize_and_part(part);

            let req = VersionReq::parse(&normalized)
                .map_err(|err| Error::new(original.to_string(), err.to_string()))?;

            ranges.push(req);
        }

        if ranges.is_empty() {
            let req = VersionReq::parse("*")
                .map_err(|err| Error::new(original.to_string(), err.to_string()))?;
            ranges.push(req);
        }

        Ok(RangeSet {
            original: original.to_string(),
            ranges,
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.ranges.iter().any(|r| r.matches(version))
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Highest version among `candidates` that satisfies this set.
    /// Strings that are not valid versions are ignored.
    pub fn max_satisfying<'a, I>(&self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut best: Option<(Version, &'a str)> = None;

        for raw in candidates {
            let Ok(version) = Version::parse(raw) else {
                continue;
            };

            if !self.matches(&version) {
                continue;
            }

            match &best {
                Some((current, _)) if version <= *current => {}
                _ => best = Some((version, raw)),
            }
        }

        best.map(|(_, raw)| raw)
    }
}

fn normalize_and_part(part: &str) -> String {
    let tokens: Vec<&str> = part.split_whitespace().collect();

    if tokens.len() == 3 && tokens[1] == "-" {
        return hyphen_range(tokens[0], tokens[2]);
    }

    let mut comparators: Vec<String> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let after_operator = i > 0 && is_operator(tokens[i - 1]);

        if after_operator {
            if let Some(last) = comparators.last_mut() {
                last.push(' ');
                last.push_str(token);
            }
            continue;
        }

        match bare_comparator(token) {
            Some(Bare::Any) => {}
            Some(bare) => comparators.push(bare.to_req()),
            None => comparators.push(token.to_string()),
        }
    }

    if comparators.is_empty() {
        "*".to_string()
    } else {
        comparators.join(", ")
    }
}

fn is_operator(token: &str) -> bool {
    matches!(token, "=" | ">" | ">=" | "<" | "<=" | "~" | "^")
}

/// A comparator written without an operator. npm reads these as exact
/// versions or as X-ranges, unlike the caret default of `VersionReq`.
enum Bare {
    Any,
    Major(u64),
    Minor(u64, u64),
    Exact(String),
}

impl Bare {
    fn to_req(&self) -> String {
        match self {
            Bare::Any => "*".to_string(),
            Bare::Major(major) => format!(">={}.0.0, <{}.0.0", major, major.saturating_add(1)),
            Bare::Minor(major, minor) => {
                format!(">={}.{}.0, <{}.{}.0", major, minor, major, minor.saturating_add(1))
            }
            Bare::Exact(version) => format!("={}", version),
        }
    }
}

fn bare_comparator(token: &str) -> Option<Bare> {
    let token = token.strip_prefix(['v', 'V']).unwrap_or(token);

    if !token.starts_with(|c: char| c.is_ascii_digit() || matches!(c, 'x' | 'X' | '*')) {
        return None;
    }

    if Version::parse(token).is_ok() {
        return Some(Bare::Exact(token.to_string()));
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut numbers = Vec::new();
    for part in parts {
        if matches!(part, "x" | "X" | "*") {
            break;
        }
        numbers.push(part.parse::<u64>().ok()?);
    }

    match numbers.as_slice() {
        [] => Some(Bare::Any),
        [major] => Some(Bare::Major(*major)),
        [major, minor] => Some(Bare::Minor(*major, *minor)),
        _ => None,
    }
}

/// `a - b` is inclusive; a partial upper bound covers everything it names.
fn hyphen_range(lower: &str, upper: &str) -> String {
    let lower = match bare_comparator(lower) {
        Some(Bare::Exact(version)) => format!(">={}", version),
        Some(Bare::Major(major)) => format!(">={}.0.0", major),
        Some(Bare::Minor(major, minor)) => format!(">={}.{}.0", major, minor),
        Some(Bare::Any) | None => String::new(),
    };

    let upper = match bare_comparator(upper) {
        Some(Bare::Exact(version)) => format!("<={}", version),
        Some(Bare::Major(major)) => format!("<{}.0.0", major.saturating_add(1)),
        Some(Bare::Minor(major, minor)) => format!("<{}.{}.0", major, minor.saturating_add(1)),
        Some(Bare::Any) | None => String::new(),
    };

    match (lower.is_empty(), upper.is_empty()) {
        (true, true) => "*".to_string(),
        (false, true) => lower,
        (true, false) => upper,
        (false, false) => format!("{}, {}", lower, upper),
    }
}

/// Loose cleanup of a version string as published upstream: trims
/// whitespace and strips a leading `v` or `=`. Returns `None` when the
/// result still does not parse.
pub fn clean(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches(['=', 'v', 'V']).trim();
    Version::parse(trimmed).ok().map(|v| v.to_string())
}

/// True when `raw` is an exact version rather than a range.
pub fn is_exact(raw: &str) -> bool {
    Version::parse(raw.trim()).is_ok()
}

/// Semver ordering; unparseable versions sort after valid ones, then
/// lexically among themselves.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (Version::parse(a), Version::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

pub use semver::Version;
