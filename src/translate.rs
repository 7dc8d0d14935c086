//! Copy-and-translate driver (component G).
//!
//! The file-level pipeline: stat the source, dispatch to the special-file
//! codec when needed, otherwise stream the source through the chunk
//! transducer into a sibling temp file and atomically rename it over the
//! destination.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::eol::EolStyle;
use crate::error::{Result, SubstError};
use crate::keywords::KeywordSet;
use crate::special;
use crate::subst::TranslationState;

const CHUNK: usize = 16 * 1024;

/// Grouped translation policy for one [`copy_and_translate`] call (§10.3
/// ambient configuration surface over §3's per-call parameters).
#[derive(Debug, Clone, Default)]
pub struct TranslationOptions {
    pub eol_target: Option<Vec<u8>>,
    pub repair: bool,
    pub keywords: Option<KeywordSet>,
    pub expand: bool,
    pub special: bool,
}

impl TranslationOptions {
    pub fn new() -> Self {
        Self {
            eol_target: None,
            repair: false,
            keywords: None,
            expand: true,
            special: false,
        }
    }

    pub fn eol_target(mut self, eol_target: Option<Vec<u8>>) -> Self {
        self.eol_target = eol_target;
        self
    }

    pub fn repair(mut self, repair: bool) -> Self {
        self.repair = repair;
        self
    }

    pub fn keywords(mut self, keywords: Option<KeywordSet>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    pub fn special(mut self, special: bool) -> Self {
        self.special = special;
        self
    }

    fn keywords_present(&self) -> bool {
        self.keywords.as_ref().is_some_and(|k| !k.is_empty())
    }
}

/// Run the full pipeline described in §4.7.
pub fn copy_and_translate(src: &Path, dst: &Path, opts: &TranslationOptions) -> Result<()> {
    let meta = fs::symlink_metadata(src).map_err(|e| SubstError::io("stat", src, e))?;
    let src_is_special = meta.file_type().is_symlink();

    if opts.special || src_is_special {
        debug!(src = %src.display(), dst = %dst.display(), "dispatching to special-file codec");
        return if opts.expand {
            special::materialize(src, dst)
        } else {
            special::detranslate(src, dst)
        };
    }

    if opts.eol_target.is_none() && !opts.keywords_present() {
        debug!(src = %src.display(), dst = %dst.display(), "no translation needed, plain copy");
        fs::copy(src, dst).map_err(|e| SubstError::io("copy", dst, e))?;
        return Ok(());
    }

    let mut source = File::open(src).map_err(|e| SubstError::io("open", src, e))?;
    let dir = dst.parent().unwrap_or_else(|| Path::new("."));
    let mut temp =
        NamedTempFile::new_in(dir).map_err(|e| SubstError::io("create temp file", dir, e))?;
    debug!(src = %src.display(), temp = %temp.path().display(), "translating to temp file");

    let mut state = TranslationState::new(
        opts.eol_target.clone(),
        opts.repair,
        opts.expand,
        opts.keywords.clone(),
    );
    let mut raw = vec![0u8; CHUNK];
    let result: Result<()> = (|| {
        loop {
            let n = source
                .read(&mut raw)
                .map_err(|e| SubstError::io("read", src, e))?;
            if n == 0 {
                break;
            }
            state.transduce(Some(&raw[..n]), &mut temp)?;
        }
        state.transduce(None, &mut temp)
    })();

    match result {
        Ok(()) => {
            temp.persist(dst)
                .map_err(|e| SubstError::io("rename", dst, e.error))?;
            Ok(())
        }
        Err(SubstError::InconsistentEol { .. }) => Err(SubstError::InconsistentEol {
            path: Some(src.to_path_buf()),
        }),
        Err(other) => Err(other),
    }
}

/// Normalize a working-copy file into repository-canonical form:
/// contracted keywords, repaired line endings, `native` resolved to the
/// repository default. Fails fast on an unrecognized `eol-style` value
/// rather than silently skipping EOL translation (grounded in
/// `svn_subst_translate_to_normal_form`; §11).
pub fn translate_to_normal_form(
    src: &Path,
    dst: &Path,
    eol_value: Option<&str>,
    keywords: Option<KeywordSet>,
) -> Result<()> {
    let (style, eol) = crate::eol::resolve_required(eol_value)?;
    let eol_target = match style {
        EolStyle::Native => Some(crate::eol::REPOSITORY_EOL.to_vec()),
        EolStyle::Fixed => eol,
        EolStyle::None => None,
        EolStyle::Unknown => unreachable!("resolve_required rejects Unknown"),
    };
    let opts = TranslationOptions::new()
        .eol_target(eol_target)
        .repair(true)
        .keywords(keywords)
        .expand(false);
    copy_and_translate(src, dst, &opts)
}
