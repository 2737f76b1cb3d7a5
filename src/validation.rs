/// Field validation for contact-form submissions.
///
/// The CPF check is the authoritative one: a lead is never persisted with a CPF
/// that fails its check digits. Email and phone checks mirror what the contact
/// form enforces before submitting.
use regex::Regex;
use std::sync::OnceLock;

/// Number of digits in a CPF.
const CPF_LEN: usize = 11;

fn digits_only(raw: &str) -> Vec<u32> {
    raw.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Computes one CPF check digit from the leading digits.
///
/// Weights descend from `digits.len() + 1` down to 2. A remainder of 10 (or 11)
/// maps to 0.
fn check_digit(digits: &[u32]) -> u32 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (top - i as u32))
        .sum();

    match (sum * 10) % 11 {
        10 | 11 => 0,
        r => r,
    }
}

/// Validates a Brazilian CPF (Cadastro de Pessoas Físicas).
///
/// Accepts formatted (`123.456.789-09`) or bare (`12345678909`) input; every
/// non-digit character is stripped first.
///
/// Returns `false` when:
/// - the input does not contain exactly 11 digits
/// - all 11 digits are the same (`000.000.000-00`, `111.111.111-11`, ...)
/// - either check digit does not match
pub fn is_valid_cpf(raw: &str) -> bool {
    let digits = digits_only(raw);
    if digits.len() != CPF_LEN {
        return false;
    }

    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

/// Loose email shape check: `something@something.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
    re.is_match(email.trim())
}

/// Brazilian phone numbers carry 10 (landline) or 11 (mobile) digits including DDD.
pub fn is_valid_phone(phone: &str) -> bool {
    matches!(digits_only(phone).len(), 10 | 11)
}

/// Formats a CPF as `000.000.000-00`.
///
/// Input that does not hold exactly 11 digits is returned unchanged.
pub fn format_cpf(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != CPF_LEN {
        return raw.to_string();
    }

    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}

/// Formats a phone number as `(00) 0000-0000` or `(00) 00000-0000`.
///
/// Input with a digit count other than 10 or 11 is returned unchanged.
pub fn format_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        10 => format!("({}) {}-{}", &digits[0..2], &digits[2..6], &digits[6..10]),
        11 => format!("({}) {}-{}", &digits[0..2], &digits[2..7], &digits[7..11]),
        _ => raw.to_string(),
    }
}
