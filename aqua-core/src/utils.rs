//! String and URL helpers used during endpoint compilation.

use regex::Regex;
use std::sync::OnceLock;

fn mult_slashes() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/+").expect("slash regex"))
}

fn mux_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[^/]+\}").expect("placeholder regex"))
}

/// Join URL pieces into a single relative URL, collapsing duplicate slashes.
/// Empty pieces and the `-` sentinel are skipped.
pub fn clean_url<S: AsRef<str>>(pieces: &[S]) -> String {
    let mut buf = String::from("/");
    for p in pieces {
        let p = p.as_ref();
        if !p.is_empty() && p != "-" {
            buf.push('/');
            buf.push_str(p);
        }
    }
    remove_mult_slashes(&buf)
}

/// Collapse runs of `/` into a single slash.
pub fn remove_mult_slashes(inp: &str) -> String {
    mult_slashes().replace_all(inp, "/").into_owned()
}

/// Project a camel-case identifier onto its URL form:
/// `AbraKaDabra` → `abra-ka-dabra`, `NCR` → `n-c-r`, digits pass through.
pub fn url_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Uppercase the first character: `golang` → `Golang`.
pub fn sentence_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Extract mux variable names from `{name}` / `{name:regex}` placeholders,
/// preserving order.
pub fn extract_route_vars(url: &str) -> Vec<String> {
    mux_placeholder()
        .find_iter(url)
        .map(|m| {
            let inner = &m.as_str()[1..m.as_str().len() - 1];
            match inner.find(':') {
                Some(pos) if pos > 0 => inner[..pos].to_string(),
                _ => inner.to_string(),
            }
        })
        .collect()
}

/// Extract the regex constraints of `{name:regex}` placeholders, keyed by
/// position. A plain `{name}` yields `None`.
pub fn extract_route_var_patterns(url: &str) -> Vec<Option<String>> {
    mux_placeholder()
        .find_iter(url)
        .map(|m| {
            let inner = &m.as_str()[1..m.as_str().len() - 1];
            match inner.find(':') {
                Some(pos) if pos > 0 => Some(inner[pos + 1..].to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Rewrite `{name:regex}` placeholders to plain `{name}` for the router,
/// which does not understand inline constraints.
pub fn strip_route_var_patterns(url: &str) -> String {
    mux_placeholder()
        .replace_all(url, |caps: &regex::Captures<'_>| {
            let m = caps.get(0).expect("placeholder match").as_str();
            let inner = &m[1..m.len() - 1];
            match inner.find(':') {
                Some(pos) if pos > 0 => format!("{{{}}}", &inner[..pos]),
                _ => m.to_string(),
            }
        })
        .into_owned()
}
