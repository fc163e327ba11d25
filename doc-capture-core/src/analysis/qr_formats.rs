//! Payment-QR dialects: detection, structural validation, field extraction.
//!
//! A string that matches a dialect's signature but breaks its structure is
//! reported as `InvalidForFormat`, so the UI can tell the user the code is
//! damaged. Strings with no known signature are `Unrecognized`.

use std::collections::HashMap;

use url::Url;

use super::iban;
use crate::models::error::QrParseError;
use crate::models::qr::{PaymentAmount, PaymentParameters, QrFormat, QrPayload, QrValidity};

const EPC_SERVICE_TAG: &str = "BCD";
const EPC_MAX_NAME_LEN: usize = 70;
const EPC_MAX_AMOUNT_MINOR: u64 = 99_999_999_999;
const BEZAHLCODE_PREFIX: &str = "bank://singlepayment";
const EPS_SCHEME: &str = "epspayment";

/// Which dialect `raw` claims to be, judged by its signature only.
pub fn detect_format(raw: &str) -> Option<QrFormat> {
    let trimmed = raw.trim_start();
    let first_line = trimmed.lines().next().unwrap_or_default().trim();
    if first_line == EPC_SERVICE_TAG {
        return Some(QrFormat::Epc06912);
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with(BEZAHLCODE_PREFIX) {
        return Some(QrFormat::BezahlCode);
    }
    if lower.starts_with(&format!("{}://", EPS_SCHEME)) {
        return Some(QrFormat::EpsPayment);
    }
    None
}

/// Detect, validate and extract a decoded QR string.
pub fn classify(raw: &str) -> QrPayload {
    let Some(format) = detect_format(raw) else {
        return QrPayload {
            raw: raw.to_string(),
            format: None,
            validity: QrValidity::Unrecognized,
            payment: None,
        };
    };

    let parsed = match format {
        QrFormat::Epc06912 => parse_epc06912(raw).map(Some),
        QrFormat::BezahlCode => parse_bezahlcode(raw).map(Some),
        QrFormat::EpsPayment => parse_eps(raw).map(|()| None),
    };

    let (validity, payment) = match parsed {
        Ok(payment) => (QrValidity::Valid, payment),
        Err(e) => (QrValidity::InvalidForFormat(e.to_string()), None),
    };
    QrPayload {
        raw: raw.to_string(),
        format: Some(format),
        validity,
        payment,
    }
}

/// EPC069-12 SEPA credit transfer, one field per line.
///
/// ```text
/// 0 BCD | 1 version | 2 charset | 3 SCT | 4 BIC | 5 name | 6 IBAN
/// 7 amount | 8 purpose | 9 structured ref | 10 remittance text | 11 info
/// ```
pub fn parse_epc06912(raw: &str) -> Result<PaymentParameters, QrParseError> {
    let lines: Vec<&str> = raw.trim_start().split('\n').map(|l| l.trim_end_matches('\r').trim()).collect();
    let field = |index: usize| lines.get(index).copied().filter(|s| !s.is_empty());

    let version = field(1).ok_or(QrParseError::MissingField("version"))?;
    if !matches!(version, "001" | "002") {
        return Err(unsupported("version", version));
    }
    let charset = field(2).ok_or(QrParseError::MissingField("character set"))?;
    if !matches!(charset, "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8") {
        return Err(unsupported("character set", charset));
    }
    let identification = field(3).ok_or(QrParseError::MissingField("identification"))?;
    if identification != "SCT" {
        return Err(unsupported("identification", identification));
    }

    let bic = match field(4) {
        Some(bic) if is_valid_bic(bic) => Some(bic.to_ascii_uppercase()),
        Some(bic) => return Err(invalid("bic", bic)),
        None if version == "001" => return Err(QrParseError::MissingField("bic")),
        None => None,
    };

    let recipient = field(5).ok_or(QrParseError::MissingField("recipient"))?;
    if recipient.chars().count() > EPC_MAX_NAME_LEN {
        return Err(invalid("recipient", recipient));
    }

    let account = field(6).ok_or(QrParseError::MissingField("iban"))?;
    if !iban::is_valid_iban(account) {
        return Err(invalid("iban", account));
    }

    let amount = match field(7) {
        Some(amount) => Some(parse_epc_amount(amount)?),
        None => None,
    };

    let reference = field(9).or_else(|| field(10)).map(str::to_string);

    Ok(PaymentParameters {
        recipient: recipient.to_string(),
        iban: iban::normalize(account),
        bic,
        amount,
        reference,
    })
}

fn parse_epc_amount(amount: &str) -> Result<PaymentAmount, QrParseError> {
    let value = amount.strip_prefix("EUR").ok_or_else(|| unsupported("currency", amount))?;
    match parse_minor_units(value) {
        Some(minor) if (1..=EPC_MAX_AMOUNT_MINOR).contains(&minor) => Ok(PaymentAmount {
            minor_units: minor,
            currency: "EUR".into(),
        }),
        _ => Err(invalid("amount", amount)),
    }
}

/// BezahlCode: `bank://singlepaymentsepa?name=..&iban=..&bic=..&amount=..&reason=..`
pub fn parse_bezahlcode(raw: &str) -> Result<PaymentParameters, QrParseError> {
    let url = Url::parse(raw.trim()).map_err(|e| QrParseError::MalformedUri(e.to_string()))?;
    let params: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .filter(|(_, v)| !v.is_empty())
        .collect();

    let recipient = params.get("name").ok_or(QrParseError::MissingField("recipient"))?;
    let account = params.get("iban").ok_or(QrParseError::MissingField("iban"))?;
    if !iban::is_valid_iban(account) {
        return Err(invalid("iban", account));
    }

    let bic = match params.get("bic") {
        Some(bic) if is_valid_bic(bic) => Some(bic.to_ascii_uppercase()),
        Some(bic) => return Err(invalid("bic", bic)),
        None => None,
    };

    let amount = match params.get("amount") {
        Some(amount) => {
            let minor = parse_minor_units(amount).ok_or_else(|| invalid("amount", amount))?;
            let currency = params
                .get("currency")
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or_else(|| "EUR".into());
            Some(PaymentAmount {
                minor_units: minor,
                currency,
            })
        }
        None => None,
    };

    Ok(PaymentParameters {
        recipient: recipient.clone(),
        iban: iban::normalize(account),
        bic,
        amount,
        reference: params.get("reason").cloned(),
    })
}

/// EPS e-payment: an `epspayment://` URL handed on to the banking app.
pub fn parse_eps(raw: &str) -> Result<(), QrParseError> {
    let url = Url::parse(raw.trim()).map_err(|e| QrParseError::MalformedUri(e.to_string()))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(QrParseError::MissingField("host")),
    }
}

/// 8 or 11 characters: bank (4 letters), country (2 letters), location,
/// optional branch.
pub fn is_valid_bic(bic: &str) -> bool {
    let bytes = bic.as_bytes();
    matches!(bytes.len(), 8 | 11)
        && bytes.iter().all(u8::is_ascii_alphanumeric)
        && bytes[..6].iter().all(u8::is_ascii_alphabetic)
}

/// Parse a decimal amount ("12", "12.5", "12,50") into minor units.
pub fn parse_minor_units(value: &str) -> Option<u64> {
    let (whole, fraction) = match value.find(['.', ',']) {
        Some(i) => (&value[..i], &value[i + 1..]),
        None => (value, ""),
    };
    if whole.is_empty()
        || fraction.len() > 2
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let whole: u64 = whole.parse().ok()?;
    let cents: u64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(cents)
}

fn invalid(field: &'static str, value: &str) -> QrParseError {
    QrParseError::InvalidField {
        field,
        value: value.to_string(),
    }
}

fn unsupported(field: &'static str, value: &str) -> QrParseError {
    QrParseError::Unsupported {
        field,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPC_VALID: &str =
        "BCD\n002\n1\nSCT\nCOBADEFFXXX\nRed Cross\nDE89370400440532013000\nEUR12.5\n\n\nDonation 2024\n";

    #[test]
    fn epc_valid_payload_extracts_payment() {
        let payload = classify(EPC_VALID);
        assert_eq!(payload.format, Some(QrFormat::Epc06912));
        assert_eq!(payload.validity, QrValidity::Valid);

        let payment = payload.payment.unwrap();
        assert_eq!(payment.recipient, "Red Cross");
        assert_eq!(payment.iban, "DE89370400440532013000");
        assert_eq!(payment.bic.as_deref(), Some("COBADEFFXXX"));
        assert_eq!(payment.amount.unwrap().to_string(), "12.50:EUR");
        assert_eq!(payment.reference.as_deref(), Some("Donation 2024"));
    }

    #[test]
    fn epc_accepts_crlf_and_missing_bic_in_v2() {
        let raw = "BCD\r\n002\r\n1\r\nSCT\r\n\r\nACME GmbH\r\nDE89 3704 0044 0532 0130 00";
        let payload = classify(raw);
        assert_eq!(payload.validity, QrValidity::Valid);
        assert_eq!(payload.payment.unwrap().bic, None);
    }

    #[test]
    fn epc_with_bad_iban_is_invalid_for_format() {
        let raw = "BCD\n002\n1\nSCT\n\nACME GmbH\nDE00370400440532013000\nEUR10";
        let payload = classify(raw);
        assert_eq!(payload.format, Some(QrFormat::Epc06912));
        assert!(matches!(payload.validity, QrValidity::InvalidForFormat(ref r) if r.contains("iban")));
        assert!(payload.payment.is_none());
    }

    #[test]
    fn epc_structural_failures() {
        let cases = [
            "BCD\n003\n1\nSCT\n\nACME\nDE89370400440532013000",
            "BCD\n001\n1\nSCT\n\nACME\nDE89370400440532013000",
            "BCD\n002\n1\nINST\n\nACME\nDE89370400440532013000",
            "BCD\n002\n1\nSCT\n\n\nDE89370400440532013000",
            "BCD\n002\n1\nSCT\n\nACME\nDE89370400440532013000\nUSD5",
            "BCD\n002\n1\nSCT\n\nACME\nDE89370400440532013000\nEUR0",
            "BCD",
        ];
        for raw in cases {
            let payload = classify(raw);
            assert!(
                matches!(payload.validity, QrValidity::InvalidForFormat(_)),
                "expected invalid: {:?}",
                raw
            );
        }
    }

    #[test]
    fn bezahlcode_valid_with_percent_encoding() {
        let raw = "bank://singlepaymentsepa?name=M%C3%BCller%20GmbH&iban=DE89370400440532013000&bic=COBADEFF&amount=99,90&reason=RE%201234";
        let payload = classify(raw);
        assert_eq!(payload.format, Some(QrFormat::BezahlCode));
        assert_eq!(payload.validity, QrValidity::Valid);

        let payment = payload.payment.unwrap();
        assert_eq!(payment.recipient, "Müller GmbH");
        assert_eq!(payment.amount.unwrap().minor_units, 9990);
        assert_eq!(payment.reference.as_deref(), Some("RE 1234"));
    }

    #[test]
    fn bezahlcode_without_iban_is_invalid() {
        let payload = classify("bank://singlepayment?name=ACME&account=12345&bnc=37040044");
        assert_eq!(payload.format, Some(QrFormat::BezahlCode));
        assert!(matches!(payload.validity, QrValidity::InvalidForFormat(_)));
    }

    #[test]
    fn eps_url() {
        let payload = classify("epspayment://eps.or.at/?transactionid=epsJMG7ML2P72");
        assert_eq!(payload.format, Some(QrFormat::EpsPayment));
        assert_eq!(payload.validity, QrValidity::Valid);
        assert!(payload.payment.is_none());
    }

    #[test]
    fn unknown_strings_are_unrecognized() {
        for raw in ["hello world", "https://example.com/pay", "", "WIFI:S:home;T:WPA;P:secret;;"] {
            let payload = classify(raw);
            assert_eq!(payload.validity, QrValidity::Unrecognized);
            assert_eq!(payload.format, None);
        }
    }

    #[test]
    fn bic_shapes() {
        assert!(is_valid_bic("COBADEFF"));
        assert!(is_valid_bic("COBADEFFXXX"));
        assert!(!is_valid_bic("COBADE"));
        assert!(!is_valid_bic("CO1ADEFF"));
    }

    #[test]
    fn minor_units() {
        assert_eq!(parse_minor_units("12"), Some(1200));
        assert_eq!(parse_minor_units("12.5"), Some(1250));
        assert_eq!(parse_minor_units("12,05"), Some(1205));
        assert_eq!(parse_minor_units("12.345"), None);
        assert_eq!(parse_minor_units(".5"), None);
        assert_eq!(parse_minor_units("1e3"), None);
    }
}
