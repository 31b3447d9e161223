use thiserror::Error;

/// Failure to map a positional contract tuple onto a named record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{record}: expected {expected} fields, found {found}")]
    Length {
        record: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{record}.{field} (position {index}): expected {expected}, found {found}")]
    Field {
        record: &'static str,
        index: usize,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{record}.{field}: value does not fit in 64 bits")]
    Overflow {
        record: &'static str,
        field: &'static str,
    },

    #[error("{record}: expected an array of tuples, found {found}")]
    NotAList {
        record: &'static str,
        found: &'static str,
    },

    #[error("{record}[{index}]: {source}")]
    Element {
        record: &'static str,
        index: usize,
        #[source]
        source: Box<DecodeError>,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    #[error("exchange rate must be a finite number, got {0}")]
    NotFinite(f64),

    #[error("exchange rate must be greater than zero, got {0}")]
    NotPositive(f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid ETH amount: {0}")]
    Invalid(String),

    #[error("ETH amounts carry at most 18 decimals")]
    TooPrecise,

    #[error("amount does not fit in 256 bits")]
    Overflow,
}
