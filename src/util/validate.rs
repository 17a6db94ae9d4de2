//! Shared field validation used by both the funnel wizard and the intake
//! endpoint. The server never trusts the client: the same rules run again on
//! every submission.

/// Fallback extension when a filename carries none, or an unsafe one.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Maximum number of photos per submission.
pub const MAX_PHOTOS: usize = 6;

/// Per-file photo ceiling (8 MB).
pub const MAX_PHOTO_BYTES: usize = 8 * 1024 * 1024;

/// Aggregate photo ceiling per submission (25 MB).
pub const MAX_TOTAL_PHOTO_BYTES: usize = 25 * 1024 * 1024;

const MAX_EXTENSION_LEN: usize = 8;

/// Count decimal digits in a string.
pub fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

/// Basic `local@domain.tld` shape check.
///
/// Deliberately weak: `a@b.c` passes. This mirrors the documented behavior of
/// the funnel, not a full RFC 5321 parser.
pub fn is_valid_email(s: &str) -> bool {
    let s = s.trim();
    let mut parts = s.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = match parts.next() {
        Some(d) => d,
        None => return false,
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') && domain.len() >= 3
}

/// Phone is acceptable server-side when it has at least 8 digits after
/// stripping everything else.
pub fn is_valid_phone(s: &str) -> bool {
    digit_count(s) >= 8
}

/// Whether a value entered in the single contact field looks like an email.
fn looks_like_email(s: &str) -> bool {
    s.contains('@') && s.contains('.') && !s.starts_with('.') && !s.ends_with('.')
}

/// Client-side contact rule: trimmed length >= 5, and either an email shape or
/// a phone shape (>= 9 digits after stripping).
pub fn is_valid_contact(s: &str) -> bool {
    let s = s.trim();
    if s.len() < 5 {
        return false;
    }
    looks_like_email(s) || digit_count(s) >= 9
}

/// Blur normalization for the contact field: email values pass through
/// trimmed; anything else keeps only digits and a leading `+`, with a `00`
/// international prefix rewritten to `+`.
pub fn normalize_contact(s: &str) -> String {
    let s = s.trim();
    if s.contains('@') {
        return s.to_string();
    }
    let mut digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    let plus = s.starts_with('+');
    if digits.starts_with("00") {
        digits = digits[2..].to_string();
        return format!("+{digits}");
    }
    if plus {
        return format!("+{digits}");
    }
    digits
}

/// Derive a safe lowercase alphanumeric extension from a filename.
///
/// Anything absent, longer than 8 characters, or containing a non-alphanumeric
/// character falls back to `bin`.
pub fn sanitize_extension(filename: &str) -> String {
    let ext = filename
        .rsplit('.')
        .next()
        .filter(|e| *e != filename && !e.is_empty());
    match ext {
        Some(e) => {
            let lower = e.to_lowercase();
            if lower.len() <= MAX_EXTENSION_LEN && lower.chars().all(|c| c.is_ascii_alphanumeric())
            {
                lower
            } else {
                FALLBACK_EXTENSION.to_string()
            }
        }
        None => FALLBACK_EXTENSION.to_string(),
    }
}
