//! EOL policy resolution (component A).
//!
//! Maps the raw value of an `svn:eol-style`-equivalent property to a
//! resolved [`EolStyle`] and the target terminator bytes to emit.

use crate::error::SubstError;

/// Repository canonical line terminator.
pub const REPOSITORY_EOL: &[u8] = b"\n";

/// EOL style resolved from a policy string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EolStyle {
    /// No EOL translation is requested.
    None,
    /// Use the platform's native terminator.
    Native,
    /// Use a specific fixed terminator (`LF`, `CR`, or `CRLF`).
    Fixed,
    /// The policy string wasn't recognized.
    Unknown,
}

/// The platform's native line terminator.
#[cfg(windows)]
pub fn native_eol() -> &'static [u8] {
    b"\r\n"
}

#[cfg(not(windows))]
pub fn native_eol() -> &'static [u8] {
    b"\n"
}

/// Resolve a raw `eol-style` property value (`None` if the property is
/// unset) into a style and its target terminator bytes.
///
/// Comparison against the recognized tokens is byte-exact and
/// case-sensitive, per §4.1.
pub fn eol_style_from_value(value: Option<&str>) -> (EolStyle, Option<Vec<u8>>) {
    match value {
        None => (EolStyle::None, None),
        Some("native") => (EolStyle::Native, Some(native_eol().to_vec())),
        Some("LF") => (EolStyle::Fixed, Some(b"\n".to_vec())),
        Some("CR") => (EolStyle::Fixed, Some(b"\r".to_vec())),
        Some("CRLF") => (EolStyle::Fixed, Some(b"\r\n".to_vec())),
        Some(_) => (EolStyle::Unknown, None),
    }
}

/// Resolve an `eol-style` value, failing with [`SubstError::UnknownEol`] if
/// it doesn't parse to a usable target (used by
/// [`crate::translate::translate_to_normal_form`], which cannot tolerate an
/// unrecognized style).
pub fn resolve_required(value: Option<&str>) -> crate::error::Result<(EolStyle, Option<Vec<u8>>)> {
    let (style, eol) = eol_style_from_value(value);
    if style == EolStyle::Unknown {
        return Err(SubstError::UnknownEol {
            value: value.unwrap_or_default().to_string(),
        });
    }
    Ok((style, eol))
}

/// Is translation required for the given combination of parameters? (§4.1)
#[allow(clippy::too_many_arguments)]
pub fn translation_required(
    style: EolStyle,
    eol: Option<&[u8]>,
    keywords_present: bool,
    special: bool,
    force_eol_check: bool,
) -> bool {
    special
        || keywords_present
        || (style != EolStyle::None && force_eol_check)
        || (style == EolStyle::Native && native_eol() != REPOSITORY_EOL)
        || (style == EolStyle::Fixed && eol.is_some_and(|eol| eol != native_eol()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_resolves_to_platform_eol() {
        let (style, eol) = eol_style_from_value(Some("native"));
        assert_eq!(style, EolStyle::Native);
        assert_eq!(eol.unwrap(), native_eol());
    }

    #[test]
    fn fixed_styles() {
        assert_eq!(
            eol_style_from_value(Some("LF")),
            (EolStyle::Fixed, Some(b"\n".to_vec()))
        );
        assert_eq!(
            eol_style_from_value(Some("CR")),
            (EolStyle::Fixed, Some(b"\r".to_vec()))
        );
        assert_eq!(
            eol_style_from_value(Some("CRLF")),
            (EolStyle::Fixed, Some(b"\r\n".to_vec()))
        );
    }

    #[test]
    fn absent_is_none() {
        assert_eq!(eol_style_from_value(None), (EolStyle::None, None));
    }

    #[test]
    fn unrecognized_is_unknown() {
        assert_eq!(
            eol_style_from_value(Some("lf")),
            (EolStyle::Unknown, None)
        );
        assert_eq!(
            eol_style_from_value(Some("")),
            (EolStyle::Unknown, None)
        );
    }

    #[test]
    fn translation_required_covers_special_and_keywords() {
        assert!(translation_required(EolStyle::None, None, false, true, false));
        assert!(translation_required(EolStyle::None, None, true, false, false));
        assert!(!translation_required(EolStyle::None, None, false, false, false));
    }

    #[test]
    fn translation_required_force_check() {
        assert!(translation_required(EolStyle::Fixed, Some(b"\n"), false, false, true));
        assert!(!translation_required(EolStyle::None, None, false, false, true));
    }
}
