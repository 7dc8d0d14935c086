//! Keyword set builder and expansion template formatter (component B).

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Maximum length of a keyword marker, delimiters included (§3).
pub const KEYWORD_MAX_LEN: usize = 255;

/// A built keyword set: keyword name (including every alias it was reached
/// through) to its expanded byte string.
pub type KeywordSet = HashMap<String, Vec<u8>>;

/// Immutable bundle of revision metadata used to expand keyword templates.
#[derive(Debug, Clone, Default)]
pub struct ExpansionContext {
    /// Revision number/identifier (`%r`).
    pub revision: Option<String>,
    /// URL of the file being translated (`%u`, and source of `%b`).
    pub url: Option<String>,
    /// Revision timestamp, as a Unix epoch (seconds), for `%d`/`%D`.
    pub date: Option<i64>,
    /// Author of the revision (`%a`).
    pub author: Option<String>,
}

/// One recognized keyword family: every alias that addresses it, and the
/// expansion template used to compute its value.
struct KeywordDef {
    /// Aliases matched case-sensitively (the "long" and "medium" forms).
    exact_aliases: &'static [&'static str],
    /// Aliases matched case-insensitively (the "short" form, plus `Id`).
    ci_aliases: &'static [&'static str],
    template: &'static str,
}

const KEYWORD_DEFS: &[KeywordDef] = &[
    KeywordDef {
        exact_aliases: &["LastChangedRevision", "Revision"],
        ci_aliases: &["Rev"],
        template: "%r",
    },
    KeywordDef {
        exact_aliases: &["LastChangedDate"],
        ci_aliases: &["Date"],
        template: "%D",
    },
    KeywordDef {
        exact_aliases: &["LastChangedBy"],
        ci_aliases: &["Author"],
        template: "%a",
    },
    KeywordDef {
        exact_aliases: &["HeadURL"],
        ci_aliases: &["URL"],
        template: "%u",
    },
    KeywordDef {
        exact_aliases: &[],
        ci_aliases: &["Id"],
        template: "%b %r %d %a",
    },
];

/// Bytes that split tokens in a keyword-list property (§4.2 step 1): space,
/// tab, vtab, LF, BS, CR, FF.
fn is_keyword_list_sep(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | 0x0B | b'\n' | 0x08 | b'\r' | 0x0C)
}

fn find_keyword(token: &str) -> Option<&'static KeywordDef> {
    KEYWORD_DEFS.iter().find(|def| {
        def.exact_aliases.contains(&token)
            || def
                .ci_aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(token))
    })
}

/// Format a `%`-coded expansion template against a revision context (§4.2
/// "Template format codes"). Unrecognized codes degrade to literal output
/// rather than erroring — see [`crate::error::SubstError`]'s note on
/// `InvalidTemplate`.
pub fn format_template(template: &str, ctx: &ExpansionContext) -> Vec<u8> {
    let bytes = template.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            Some(b'a') => {
                if let Some(author) = &ctx.author {
                    out.extend_from_slice(author.as_bytes());
                }
                i += 2;
            }
            Some(b'b') => {
                if let Some(url) = &ctx.url {
                    out.extend_from_slice(&url_basename_decoded(url));
                }
                i += 2;
            }
            Some(b'd') => {
                if let Some(date) = ctx.date {
                    out.extend_from_slice(short_date(date).as_bytes());
                }
                i += 2;
            }
            Some(b'D') => {
                if let Some(date) = ctx.date {
                    out.extend_from_slice(human_date(date).as_bytes());
                }
                i += 2;
            }
            Some(b'r') => {
                if let Some(rev) = &ctx.revision {
                    out.extend_from_slice(rev.as_bytes());
                }
                i += 2;
            }
            Some(b'u') => {
                if let Some(url) = &ctx.url {
                    out.extend_from_slice(url.as_bytes());
                }
                i += 2;
            }
            Some(b'%') => {
                out.push(b'%');
                i += 2;
            }
            None => {
                // Trailing '%' at end of template: literal '%'.
                out.push(b'%');
                i += 1;
            }
            Some(&other) => {
                // Unrecognized code: emit the two-byte sequence verbatim.
                out.push(b'%');
                out.push(other);
                i += 2;
            }
        }
    }
    out
}

/// Extract and percent-decode the final path segment of a (possibly
/// relative) URL. `url::Url::parse` requires an absolute URL, so a
/// relative working-copy URL falls back to a plain split on `/`.
fn url_basename_decoded(raw: &str) -> Vec<u8> {
    let basename = match url::Url::parse(raw) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segs| segs.next_back())
            .map(str::to_string)
            .unwrap_or_default(),
        Err(_) => raw.rsplit('/').next().unwrap_or(raw).to_string(),
    };
    percent_encoding::percent_decode_str(&basename).collect()
}

fn short_date(epoch_secs: i64) -> String {
    let dt: DateTime<Utc> = DateTime::from_timestamp(epoch_secs, 0).unwrap_or_default();
    dt.format("%Y-%m-%d %H:%M:%SZ").to_string()
}

fn human_date(epoch_secs: i64) -> String {
    let dt: DateTime<Utc> = DateTime::from_timestamp(epoch_secs, 0).unwrap_or_default();
    dt.format("%Y-%m-%d %H:%M:%S +0000 (%a, %d %b %Y)").to_string()
}

/// Build a keyword set from a space-delimited keyword list and an
/// expansion context (§4.2).
///
/// Unrecognized tokens are silently ignored. Every alias of a recognized
/// keyword is populated with the same expansion, so a document written
/// with one alias round-trips under any other.
pub fn build_keywords(keywords_list: &str, ctx: &ExpansionContext) -> KeywordSet {
    let mut set = KeywordSet::new();
    for token in keywords_list
        .as_bytes()
        .split(|&b| is_keyword_list_sep(b))
        .filter(|chunk| !chunk.is_empty())
    {
        let Ok(token) = std::str::from_utf8(token) else {
            continue;
        };
        let Some(def) = find_keyword(token) else {
            continue;
        };
        let value = format_template(def.template, ctx);
        for alias in def.exact_aliases.iter().chain(def.ci_aliases.iter()) {
            set.insert((*alias).to_string(), value.clone());
        }
    }
    set
}

/// Do two keyword sets differ? If `compare_values` is false, only the set
/// of keys is compared; an empty set and `None` are considered equal
/// either way.
pub fn keywords_differ(
    a: Option<&KeywordSet>,
    b: Option<&KeywordSet>,
    compare_values: bool,
) -> bool {
    let empty = KeywordSet::new();
    let a = a.unwrap_or(&empty);
    let b = b.unwrap_or(&empty);

    if a.len() != b.len() {
        return true;
    }
    for (key, a_val) in a {
        match b.get(key) {
            None => return true,
            Some(b_val) if compare_values && a_val != b_val => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExpansionContext {
        ExpansionContext {
            revision: Some("123".to_string()),
            url: Some("http://example.com/repo/file.txt".to_string()),
            date: Some(1_000_000_000),
            author: Some("jrandom".to_string()),
        }
    }

    #[test]
    fn builds_all_aliases_for_each_keyword() {
        let kw = build_keywords("Id Rev Author Date", &ctx());
        assert!(kw.contains_key("Id"));
        assert!(kw.contains_key("Rev"));
        assert!(kw.contains_key("Revision"));
        assert!(kw.contains_key("LastChangedRevision"));
        assert!(kw.contains_key("Author"));
        assert!(kw.contains_key("LastChangedBy"));
        assert!(kw.contains_key("Date"));
        assert!(kw.contains_key("LastChangedDate"));
        assert!(!kw.contains_key("URL"));
    }

    #[test]
    fn short_alias_is_case_insensitive_long_is_not() {
        let kw = build_keywords("rev REV ReV revision", &ctx());
        assert!(kw.contains_key("Rev"));
        // "revision" (lowercase) must NOT match the medium alias "Revision".
        assert!(!kw.contains_key("Revision"));
    }

    #[test]
    fn unrecognized_tokens_are_ignored() {
        let kw = build_keywords("Bogus Rev", &ctx());
        assert_eq!(kw.len(), 3); // Rev, Revision, LastChangedRevision
    }

    #[test]
    fn empty_list_yields_empty_set() {
        assert!(build_keywords("", &ctx()).is_empty());
        assert!(build_keywords("   \t\n ", &ctx()).is_empty());
    }

    #[test]
    fn id_template_combines_fields() {
        let value = format_template("%b %r %d %a", &ctx());
        assert_eq!(
            String::from_utf8(value).unwrap(),
            "file.txt 123 2001-09-09 01:46:40Z jrandom"
        );
    }

    #[test]
    fn percent_percent_is_literal() {
        assert_eq!(format_template("100%%", &ctx()), b"100%");
    }

    #[test]
    fn trailing_percent_is_literal() {
        assert_eq!(format_template("abc%", &ctx()), b"abc%");
    }

    #[test]
    fn unknown_code_is_emitted_verbatim() {
        assert_eq!(format_template("%z", &ctx()), b"%z");
    }

    #[test]
    fn absent_field_expands_to_empty() {
        let empty_ctx = ExpansionContext::default();
        assert_eq!(format_template("%r", &empty_ctx), b"");
        assert_eq!(format_template("[%r]", &empty_ctx), b"[]");
    }

    #[test]
    fn basename_is_percent_decoded() {
        let ctx = ExpansionContext {
            url: Some("http://example.com/repo/my%20file.txt".to_string()),
            ..Default::default()
        };
        assert_eq!(format_template("%b", &ctx), b"my file.txt");
    }

    #[test]
    fn keywords_differ_keys_only() {
        let mut a = KeywordSet::new();
        a.insert("Rev".to_string(), b"1".to_vec());
        let mut b = KeywordSet::new();
        b.insert("Rev".to_string(), b"2".to_vec());

        assert!(!keywords_differ(Some(&a), Some(&b), false));
        assert!(keywords_differ(Some(&a), Some(&b), true));
        assert!(!keywords_differ(None, None, true));
        assert!(keywords_differ(Some(&a), None, false));
    }
}
