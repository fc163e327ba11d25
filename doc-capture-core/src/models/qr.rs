use std::fmt;

/// Structured QR dialects the core knows how to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QrFormat {
    /// EPC069-12 SEPA credit transfer ("GiroCode").
    Epc06912,
    /// BezahlCode `bank://singlepayment...` URI.
    BezahlCode,
    /// EPS e-payment URL (Austria).
    EpsPayment,
}

/// Outcome of validating a decoded QR string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrValidity {
    Valid,
    /// The string belongs to a known format but is structurally broken.
    InvalidForFormat(String),
    /// The string matches no known format.
    Unrecognized,
}

/// Amount in minor currency units (cents for EUR).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAmount {
    pub minor_units: u64,
    pub currency: String,
}

impl fmt::Display for PaymentAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}:{}",
            self.minor_units / 100,
            self.minor_units % 100,
            self.currency
        )
    }
}

/// Payment fields extracted from a valid payment QR code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaymentParameters {
    pub recipient: String,
    pub iban: String,
    pub bic: Option<String>,
    pub amount: Option<PaymentAmount>,
    pub reference: Option<String>,
}

/// One decoded QR code, alive for a single detection-to-event cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub raw: String,
    pub format: Option<QrFormat>,
    pub validity: QrValidity,
    /// Present for valid payloads of formats that carry payment data.
    pub payment: Option<PaymentParameters>,
}

impl QrPayload {
    pub fn is_valid(&self) -> bool {
        self.validity == QrValidity::Valid
    }
}
