//! Keyword substitutor and chunk transducer (components C and D).
//!
//! [`substitute_keyword`] rewrites a single `$…$` marker in place.
//! [`TranslationState`] drives the chunked state machine that finds those
//! markers (and newlines) in an arbitrary byte stream and calls out to it.

use std::io::Write;

use crate::error::{Result, SubstError};
use crate::keywords::{KeywordSet, KEYWORD_MAX_LEN};

/// Rewrite a single keyword marker.
///
/// `buf` must satisfy `buf[0] == b'$'`, `buf[last] == b'$'`, and
/// `buf.len() <= KEYWORD_MAX_LEN` — the caller (the chunk transducer) is
/// responsible for only calling this on such a candidate run. Returns
/// `None` when `buf` does not name a keyword in `keywords`, or names one
/// but isn't shaped like any recognized marker form (§4.3) — in both
/// cases the caller must treat the run as ordinary bytes, not a match.
pub fn substitute_keyword(buf: &[u8], keywords: &KeywordSet, expand: bool) -> Option<Vec<u8>> {
    if buf.len() < 2 || buf.len() > KEYWORD_MAX_LEN || buf[0] != b'$' || buf[buf.len() - 1] != b'$'
    {
        return None;
    }
    let inner = &buf[1..buf.len() - 1];
    let name_bytes = match inner.iter().position(|&b| b == b':') {
        Some(idx) => &inner[..idx],
        None => inner,
    };
    let name = std::str::from_utf8(name_bytes).ok()?;
    let value = keywords.get(name)?;

    let len = buf.len();
    let name_len = name.len();
    let after_name = &buf[1 + name_len..];

    if after_name == b"$" || after_name == b":$" {
        return Some(if expand {
            format_variable(name, value)
        } else {
            buf.to_vec()
        });
    }

    if after_name.len() >= 3
        && &after_name[..3] == b":: "
        && len > name_len + 6
        && matches!(buf[len - 2], b' ' | b'#')
    {
        let slot_len = len - name_len - 5;
        return Some(if expand {
            format_fixed_expanded(name, value, slot_len)
        } else {
            format_fixed_contracted(name, slot_len)
        });
    }

    if after_name.len() >= 2 && &after_name[..2] == b": " && len >= name_len + 4 && buf[len - 2] == b' '
    {
        return Some(if expand {
            format_variable(name, value)
        } else {
            let mut out = Vec::with_capacity(name_len + 2);
            out.push(b'$');
            out.extend_from_slice(name.as_bytes());
            out.push(b'$');
            out
        });
    }

    None
}

/// Build `$name: VALUE $`, truncating with a `#` sentinel when `value`
/// would push the marker past [`KEYWORD_MAX_LEN`] (§3 Limits). An empty
/// value collapses to `$name: $` rather than `$name:  $`.
fn format_variable(name: &str, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + value.len() + 6);
    out.push(b'$');
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    if value.is_empty() {
        out.push(b'$');
        return out;
    }
    let max_len = KEYWORD_MAX_LEN.saturating_sub(5 + name.len());
    if value.len() <= max_len {
        out.extend_from_slice(value);
        out.push(b' ');
    } else {
        let cut = max_len.saturating_sub(1);
        out.extend_from_slice(&value[..cut]);
        out.push(b'#');
    }
    out.push(b'$');
    out
}

/// Build a fixed-length slot of exactly `slot_len` content bytes. When
/// `value` fits, it's space-padded to the slot; when it overflows, the
/// slot grows by one byte to hold the truncated value plus a `#` sentinel
/// (the original total length is not preserved in the overflow case — see
/// the worked example in the testable-properties section of the spec
/// this engine implements).
fn format_fixed_expanded(name: &str, value: &[u8], slot_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + slot_len + 7);
    out.push(b'$');
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b":: ");
    if value.len() <= slot_len {
        out.extend_from_slice(value);
        out.extend(std::iter::repeat(b' ').take(slot_len - value.len()));
    } else {
        out.extend_from_slice(&value[..slot_len]);
        out.push(b'#');
    }
    out.push(b'$');
    out
}

fn format_fixed_contracted(name: &str, slot_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + slot_len + 7);
    out.push(b'$');
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b":: ");
    out.extend(std::iter::repeat(b' ').take(slot_len));
    out.push(b'$');
    out
}

/// Per-direction transducer state (§3 "Transducer state"). One instance
/// drives one direction (read or write) of a [`crate::stream::TranslatedStream`],
/// or stands alone for a one-shot [`crate::translate::translate_bytes`] call.
pub struct TranslationState {
    eol_target: Option<Vec<u8>>,
    repair: bool,
    expand: bool,
    keywords: Option<KeywordSet>,
    newline_buf: [u8; 2],
    newline_off: usize,
    keyword_buf: Vec<u8>,
    src_eol: [u8; 2],
    src_eol_len: usize,
}

impl TranslationState {
    pub fn new(
        eol_target: Option<Vec<u8>>,
        repair: bool,
        expand: bool,
        keywords: Option<KeywordSet>,
    ) -> Self {
        Self {
            eol_target,
            repair,
            expand,
            keywords,
            newline_buf: [0; 2],
            newline_off: 0,
            keyword_buf: Vec::with_capacity(KEYWORD_MAX_LEN),
            src_eol: [0; 2],
            src_eol_len: 0,
        }
    }

    fn keywords_active(&self) -> bool {
        self.keywords.as_ref().is_some_and(|k| !k.is_empty())
    }

    fn eol_active(&self) -> bool {
        self.eol_target.is_some()
    }

    fn is_interesting(&self, b: u8) -> bool {
        (self.keywords_active() && b == b'$') || (self.eol_active() && matches!(b, b'\r' | b'\n'))
    }

    /// Feed one chunk through the transducer. Pass `None` to flush held
    /// state at end of stream (§4.4 "On flush").
    pub fn transduce<W: Write>(&mut self, input: Option<&[u8]>, out: &mut W) -> Result<()> {
        let Some(buf) = input else {
            return self.flush(out);
        };
        let n = buf.len();
        let mut i = 0usize;

        loop {
            // Phase 1: drain held state.
            if self.newline_off > 0 {
                if i < n && buf[i] == b'\n' {
                    self.newline_buf[self.newline_off] = b'\n';
                    self.newline_off += 1;
                    i += 1;
                    self.emit_newline(out)?;
                    continue;
                } else if i < n {
                    self.emit_newline(out)?;
                    continue;
                } else {
                    break; // bare CR held across the chunk boundary
                }
            }

            if !self.keyword_buf.is_empty() {
                if i < n && buf[i] == b'$' {
                    self.keyword_buf.push(b'$');
                    i += 1;
                    let rewritten = self
                        .keywords
                        .as_ref()
                        .and_then(|kw| substitute_keyword(&self.keyword_buf, kw, self.expand));
                    match rewritten {
                        Some(rewritten) => {
                            out.write_all(&rewritten).map_err(write_err)?;
                            self.keyword_buf.clear();
                        }
                        None => {
                            let kw = std::mem::take(&mut self.keyword_buf);
                            out.write_all(&kw[..kw.len() - 1]).map_err(write_err)?;
                            i -= 1; // the '$' starts a fresh candidate run
                        }
                    }
                    continue;
                }
                if self.keyword_buf.len() == KEYWORD_MAX_LEN - 1
                    || (i < n && matches!(buf[i], b'\r' | b'\n'))
                {
                    let kw = std::mem::take(&mut self.keyword_buf);
                    out.write_all(&kw).map_err(write_err)?;
                    continue;
                }
                if i < n {
                    self.keyword_buf.push(buf[i]);
                    i += 1;
                    continue;
                }
                break; // short run held across the chunk boundary
            }

            if i >= n {
                break;
            }

            // Phase 2: fast run of boring bytes.
            let start = i;
            while i < n && buf[i] != 0 && !self.is_interesting(buf[i]) {
                i += 1;
            }
            if i > start {
                out.write_all(&buf[start..i]).map_err(write_err)?;
            }
            if i >= n {
                break;
            }

            match buf[i] {
                b'$' if self.keywords_active() => {
                    self.keyword_buf.push(b'$');
                    i += 1;
                }
                b'\r' if self.eol_active() => {
                    self.newline_buf[0] = b'\r';
                    self.newline_off = 1;
                    i += 1;
                }
                b'\n' if self.eol_active() => {
                    self.newline_buf[0] = b'\n';
                    self.newline_off = 1;
                    i += 1;
                    self.emit_newline(out)?;
                }
                other => {
                    // A zero byte, or an interesting byte whose feature is
                    // inactive: neither starts held state, pass through.
                    out.write_all(&[other]).map_err(write_err)?;
                    i += 1;
                }
            }
        }
        Ok(())
    }

    fn flush<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if self.newline_off > 0 {
            self.emit_newline(out)?;
        }
        if !self.keyword_buf.is_empty() {
            let kw = std::mem::take(&mut self.keyword_buf);
            out.write_all(&kw).map_err(write_err)?;
        }
        Ok(())
    }

    /// Emit the terminator for the newline bytes currently held, checking
    /// and recording source-EOL consistency (§4.4a).
    fn emit_newline<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let off = self.newline_off;
        let observed = self.newline_buf;
        self.newline_off = 0;

        match &self.eol_target {
            None => {
                out.write_all(&observed[..off]).map_err(write_err)?;
            }
            Some(target) => {
                if self.src_eol_len == 0 {
                    self.src_eol = observed;
                    self.src_eol_len = off;
                } else if self.src_eol_len != off || self.src_eol[..off] != observed[..off] {
                    if !self.repair {
                        return Err(SubstError::InconsistentEol { path: None });
                    }
                }
                out.write_all(target).map_err(write_err)?;
            }
        }
        Ok(())
    }
}

fn write_err(source: std::io::Error) -> SubstError {
    SubstError::io("write", "<stream>", source)
}

/// Translate a complete in-memory buffer in one call — a thin convenience
/// over [`TranslationState`] for callers (property-value normalization,
/// tests) that have the whole input already and don't need streaming.
pub fn translate_bytes(
    input: &[u8],
    eol_target: Option<Vec<u8>>,
    repair: bool,
    expand: bool,
    keywords: Option<KeywordSet>,
) -> Result<Vec<u8>> {
    let mut state = TranslationState::new(eol_target, repair, expand, keywords);
    let mut out = Vec::with_capacity(input.len());
    state.transduce(Some(input), &mut out)?;
    state.transduce(None, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(pairs: &[(&str, &str)]) -> KeywordSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn unexpanded_expands() {
        let kw = keywords(&[("Rev", "42")]);
        let out = substitute_keyword(b"$Rev$", &kw, true).unwrap();
        assert_eq!(out, b"$Rev: 42 $");
    }

    #[test]
    fn expanded_contracts() {
        let kw = keywords(&[("Rev", "999")]);
        let out = substitute_keyword(b"$Rev: 999 $", &kw, false).unwrap();
        assert_eq!(out, b"$Rev$");
    }

    #[test]
    fn fixed_length_preserves_total_length_when_value_fits() {
        let kw = keywords(&[("Rev", "4")]);
        let out = substitute_keyword(b"$Rev:: 999   $", &kw, true).unwrap();
        assert_eq!(out, b"$Rev:: 4     $");
        assert_eq!(out.len(), b"$Rev:: 999   $".len());
    }

    #[test]
    fn fixed_length_truncates_with_hash_marker() {
        let kw = keywords(&[("Rev", "12345")]);
        let out = substitute_keyword(b"$Rev:: 999 $", &kw, true).unwrap();
        assert_eq!(out, b"$Rev:: 1234#$");
    }

    #[test]
    fn fixed_length_contract_fills_with_spaces() {
        let kw = keywords(&[("Rev", "4")]);
        let out = substitute_keyword(b"$Rev:: 999   $", &kw, false).unwrap();
        assert_eq!(out, b"$Rev::       $");
    }

    #[test]
    fn unrecognized_name_declines() {
        let kw = keywords(&[("Rev", "42")]);
        assert!(substitute_keyword(b"$Bogus$", &kw, true).is_none());
    }

    #[test]
    fn malformed_shape_declines() {
        let kw = keywords(&[("Rev", "42")]);
        assert!(substitute_keyword(b"$Rev:42$", &kw, true).is_none());
    }

    #[test]
    fn empty_value_unexpanded_expand() {
        let kw = keywords(&[("Author", "")]);
        let out = substitute_keyword(b"$Author$", &kw, true).unwrap();
        assert_eq!(out, b"$Author: $");
    }

    #[test]
    fn transduce_is_identity_on_boring_input() {
        let input = b"the quick brown fox";
        let got = translate_bytes(input, None, false, true, None).unwrap();
        assert_eq!(got, input);
    }

    #[test]
    fn transduce_expands_keyword_end_to_end() {
        let kw = keywords(&[("Rev", "42")]);
        let got = translate_bytes(b"r$Rev$.", None, false, true, Some(kw)).unwrap();
        assert_eq!(got, b"r$Rev: 42 $.");
    }

    #[test]
    fn transduce_normalizes_eol_and_flags_inconsistency() {
        let err = translate_bytes(b"ab\r\ncd\nef", Some(b"\n".to_vec()), false, true, None)
            .unwrap_err();
        assert!(matches!(err, SubstError::InconsistentEol { .. }));

        let got =
            translate_bytes(b"ab\r\ncd\nef", Some(b"\n".to_vec()), true, true, None).unwrap();
        assert_eq!(got, b"ab\ncd\nef");
    }

    #[test]
    fn trailing_bare_cr_flushes_as_one_terminator() {
        let got = translate_bytes(b"ab\r", Some(b"\r\n".to_vec()), false, true, None).unwrap();
        assert_eq!(got, b"ab\r\n");
    }

    #[test]
    fn chunk_boundary_inside_keyword_matches_single_chunk() {
        let kw = keywords(&[("Rev", "42")]);
        let mut state = TranslationState::new(None, false, true, Some(kw.clone()));
        let mut out = Vec::new();
        state.transduce(Some(b"r$Re"), &mut out).unwrap();
        state.transduce(Some(b"v$."), &mut out).unwrap();
        state.transduce(None, &mut out).unwrap();

        let whole = translate_bytes(b"r$Rev$.", None, false, true, Some(kw)).unwrap();
        assert_eq!(out, whole);
    }

    #[test]
    fn keyword_run_longer_than_max_is_emitted_verbatim() {
        let kw = keywords(&[("Rev", "42")]);
        let mut input = vec![b'$'];
        input.extend(std::iter::repeat(b'x').take(KEYWORD_MAX_LEN + 10));
        let got = translate_bytes(&input, None, false, true, Some(kw)).unwrap();
        assert_eq!(got, input);
    }
}
