use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::events::IbanSnapshot;

/// Country code, check digits, then up to 30 alphanumerics optionally
/// separated by single spaces (printed IBANs are grouped by four).
static IBAN_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z]{2}[0-9]{2}(?:[ ]?[A-Za-z0-9]){11,30}").expect("IBAN pattern compiles")
});

/// Registered IBAN length for a country (ISO 13616 registry).
pub fn registered_length(country: &str) -> Option<usize> {
    let len = match country {
        "NO" => 15,
        "BE" => 16,
        "DK" | "FI" | "FO" | "GL" | "NL" => 18,
        "MK" | "SI" => 19,
        "AT" | "BA" | "EE" | "KZ" | "LT" | "LU" | "XK" => 20,
        "CH" | "HR" | "LI" | "LV" => 21,
        "BG" | "BH" | "CR" | "DE" | "GB" | "GE" | "IE" | "ME" | "RS" | "VA" => 22,
        "AE" | "GI" | "IL" | "IQ" | "TL" => 23,
        "AD" | "CZ" | "ES" | "MD" | "PK" | "RO" | "SA" | "SE" | "SK" | "TN" | "VG" => 24,
        "PT" | "ST" => 25,
        "IS" | "TR" => 26,
        "FR" | "GR" | "IT" | "MC" | "MR" | "SM" => 27,
        "AL" | "AZ" | "BY" | "CY" | "DO" | "GT" | "HU" | "LB" | "PL" | "SV" => 28,
        "BR" | "EG" | "PS" | "QA" | "UA" => 29,
        "JO" | "KW" | "MU" => 30,
        "MT" | "SC" => 31,
        "LC" => 32,
        _ => return None,
    };
    Some(len)
}

/// Strip whitespace and uppercase.
pub fn normalize(candidate: &str) -> String {
    candidate
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// ISO 7064 mod-97-10 over the rearranged IBAN. Expects ASCII alphanumerics.
fn mod97(iban: &str) -> Option<u32> {
    if iban.len() < 5 || !iban.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    let (head, tail) = iban.split_at(4);
    let mut remainder = 0u32;
    for c in tail.chars().chain(head.chars()) {
        let value = c.to_digit(36)?;
        remainder = if value < 10 {
            (remainder * 10 + value) % 97
        } else {
            (remainder * 100 + value) % 97
        };
    }
    Some(remainder)
}

/// Full validation: known country, registered length, check digits.
pub fn is_valid_iban(candidate: &str) -> bool {
    let iban = normalize(candidate);
    let Some(country) = iban.get(..2) else {
        return false;
    };
    registered_length(country) == Some(iban.len()) && mod97(&iban) == Some(1)
}

/// Cut an IBAN-shaped match to its country's length and validate it.
///
/// Returns the IBAN and the byte length of `text` it consumed, so text
/// glued onto the end of a match ("...3000 due") is left for the next scan.
fn take_iban(text: &str) -> Option<(String, usize)> {
    let country = text.get(..2)?.to_ascii_uppercase();
    let expected = registered_length(&country)?;

    let mut iban = String::with_capacity(expected);
    let mut consumed = 0;
    for (offset, c) in text.char_indices() {
        if c == ' ' {
            continue;
        }
        iban.push(c.to_ascii_uppercase());
        consumed = offset + c.len_utf8();
        if iban.len() == expected {
            break;
        }
    }

    (iban.len() == expected && mod97(&iban) == Some(1)).then_some((iban, consumed))
}

/// Find every valid IBAN in `text`, normalized, in reading order.
pub fn extract_ibans(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut position = 0;
    while position < text.len() {
        let Some(m) = IBAN_SHAPE.find_at(text, position) else {
            break;
        };
        match take_iban(m.as_str()) {
            Some((iban, consumed)) => {
                found.push(iban);
                position = m.start() + consumed;
            }
            // Matches start with an ASCII letter, so +1 stays on a char boundary.
            None => position = m.start() + 1,
        }
    }
    found
}

/// Distinct IBANs seen during one detection session, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct IbanCandidateSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl IbanCandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert after normalizing. Returns false if already present.
    pub fn insert(&mut self, candidate: &str) -> bool {
        let iban = normalize(candidate);
        if iban.is_empty() || !self.seen.insert(iban.clone()) {
            return false;
        }
        self.order.push(iban);
        true
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.seen.contains(&normalize(candidate))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }

    pub fn snapshot(&self) -> IbanSnapshot {
        IbanSnapshot::new(self.order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_reference_ibans() {
        for iban in [
            "DE89370400440532013000",
            "GB82 WEST 1234 5698 7654 32",
            "NL91ABNA0417164300",
            "FR1420041010050500013M02606",
            "AT611904300234573201",
        ] {
            assert!(is_valid_iban(iban), "{} should be valid", iban);
        }
    }

    #[test]
    fn rejects_bad_check_digits_and_lengths() {
        assert!(!is_valid_iban("DE89370400440532013001"));
        assert!(!is_valid_iban("DE8937040044053201300"));
        assert!(!is_valid_iban("XX89370400440532013000"));
        assert!(!is_valid_iban(""));
    }

    #[test]
    fn extracts_from_invoice_line() {
        assert_eq!(
            extract_ibans("Invoice DE89370400440532013000 due"),
            vec!["DE89370400440532013000"]
        );
    }

    #[test]
    fn extracts_grouped_and_lowercase() {
        assert_eq!(
            extract_ibans("iban: de89 3704 0044 0532 0130 00, thanks"),
            vec!["DE89370400440532013000"]
        );
    }

    #[test]
    fn extracts_when_glued_to_label() {
        assert_eq!(extract_ibans("IBANDE89370400440532013000"), vec!["DE89370400440532013000"]);
    }

    #[test]
    fn skips_shaped_noise_before_real_iban() {
        assert_eq!(
            extract_ibans("RE12 DE89370400440532013000"),
            vec!["DE89370400440532013000"]
        );
    }

    #[test]
    fn extracts_two_adjacent_ibans() {
        assert_eq!(
            extract_ibans("DE89370400440532013000 NL91ABNA0417164300"),
            vec!["DE89370400440532013000", "NL91ABNA0417164300"]
        );
    }

    #[test]
    fn ignores_text_without_ibans() {
        assert!(extract_ibans("Total 1234 EUR, order AB12 3456").is_empty());
        assert!(extract_ibans("Grüße aus Köln").is_empty());
    }

    #[test]
    fn candidate_set_deduplicates_normalized_forms() {
        let mut set = IbanCandidateSet::new();
        assert!(set.insert("DE89370400440532013000"));
        assert!(!set.insert("de89 3704 0044 0532 0130 00"));
        assert_eq!(set.len(), 1);
        assert!(set.contains("DE89 3704 0044 0532 0130 00"));

        assert!(set.insert("NL91ABNA0417164300"));
        assert_eq!(
            set.snapshot().ibans(),
            ["DE89370400440532013000", "NL91ABNA0417164300"]
        );

        set.clear();
        assert!(set.is_empty());
        assert!(set.snapshot().is_empty());
    }
}
