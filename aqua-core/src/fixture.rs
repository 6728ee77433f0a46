//! Per-endpoint routing and behavior metadata.

use regex::Regex;
use std::sync::OnceLock;

/// The bag of routing and behavior metadata for one endpoint.
///
/// All fields are plain strings; an empty string means "unset". A fixture is
/// assembled once during endpoint compilation and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Fixture {
    pub prefix: String,
    pub root: String,
    pub url: String,
    pub version: String,
    /// `"true"`/`"1"` enable pretty-printed JSON bodies.
    pub pretty: String,
    /// Vendor token for content-negotiation aliases. Server default: `vnd.api`.
    pub vendor: String,
    /// Comma-separated module names.
    pub modules: String,
    /// Path of a canned response file; bypasses validation and dispatch.
    pub stub: String,
    pub wrap: String,

    // cache
    pub cache: String,
    pub ttl: String,

    // acl
    pub allow: String,
    pub deny: String,
}

crate::api_type!(Fixture => "aqua.Fixture");

fn tag_pair() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*):"([^"]*)""#).expect("tag regex"))
}

/// Read one key from a tag string. Returns the first non-empty value among
/// the given key synonyms.
fn tag_value(tag: &str, keys: &[&str]) -> String {
    for key in keys {
        for caps in tag_pair().captures_iter(tag) {
            if &caps[1] == *key && !caps[2].is_empty() {
                return caps[2].to_string();
            }
        }
    }
    String::new()
}

impl Fixture {
    /// Parse a struct-tag-format string (`key:"value"` pairs) into a fixture.
    ///
    /// Recognized keys and synonyms: `prefix|pre`, `root`, `url`,
    /// `version|ver`, `pretty|pty`, `vendor|vnd`, `modules|mods`, `cache`,
    /// `ttl`, `stub`, `wrap`, `allow`, `deny`. Unknown keys are ignored.
    pub fn from_tag(tag: &str) -> Fixture {
        Fixture {
            prefix: tag_value(tag, &["prefix", "pre"]),
            root: tag_value(tag, &["root"]),
            url: tag_value(tag, &["url"]),
            version: tag_value(tag, &["version", "ver"]),
            pretty: tag_value(tag, &["pretty", "pty"]),
            vendor: tag_value(tag, &["vendor", "vnd"]),
            modules: tag_value(tag, &["modules", "mods"]),
            cache: tag_value(tag, &["cache"]),
            ttl: tag_value(tag, &["ttl"]),
            stub: tag_value(tag, &["stub"]),
            wrap: tag_value(tag, &["wrap"]),
            allow: tag_value(tag, &["allow"]),
            deny: tag_value(tag, &["deny"]),
        }
    }

    /// True when pretty-printing is requested.
    pub fn wants_pretty(&self) -> bool {
        self.pretty == "true" || self.pretty == "1"
    }
}

fn pick(dst: &mut String, src: &str) {
    if dst.is_empty() && !src.is_empty() {
        *dst = src.to_string();
    }
}

/// Left-to-right merge: for each field, the first non-empty value wins.
///
/// Registration uses the order
/// `fieldTag > serviceTag > serviceEmbeddedDefault > serverDefault`.
pub fn resolve_in_order(fixtures: &[&Fixture]) -> Fixture {
    let mut out = Fixture::default();
    for fx in fixtures {
        pick(&mut out.prefix, &fx.prefix);
        pick(&mut out.root, &fx.root);
        pick(&mut out.url, &fx.url);
        pick(&mut out.version, &fx.version);
        pick(&mut out.pretty, &fx.pretty);
        pick(&mut out.vendor, &fx.vendor);
        pick(&mut out.modules, &fx.modules);
        pick(&mut out.cache, &fx.cache);
        pick(&mut out.ttl, &fx.ttl);
        pick(&mut out.stub, &fx.stub);
        pick(&mut out.wrap, &fx.wrap);
        pick(&mut out.allow, &fx.allow);
        pick(&mut out.deny, &fx.deny);
    }
    out
}
