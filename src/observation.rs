use std::{error::Error, fmt, str::FromStr};

/// The largest digit an observation can hold.
pub const MAX_DIGIT: u8 = 9;

/// A single observed digit in `[0, 9]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Observation(u8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationErr {
    OutOfRange(i64),
    Parse(String),
}

impl fmt::Display for ObservationErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationErr::OutOfRange(v) => write!(f, "{v} is not a digit between 0 and 9"),
            ObservationErr::Parse(token) => write!(f, "'{token}' is not a number"),
        }
    }
}

impl Error for ObservationErr {}

impl Observation {
    /// Creates a new `Observation`, failing if `digit` is greater than 9.
    pub fn new(digit: u8) -> Result<Self, ObservationErr> {
        if digit > MAX_DIGIT {
            return Err(ObservationErr::OutOfRange(digit.into()));
        }

        Ok(Self(digit))
    }

    /// Reduces `value` mod 10.
    pub fn wrapping(value: u8) -> Self {
        Self(value % (MAX_DIGIT + 1))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Scales the digit into `[0, 1]`.
    pub fn normalized(self) -> f32 {
        f32::from(self.0) / f32::from(MAX_DIGIT)
    }
}

impl TryFrom<i64> for Observation {
    type Error = ObservationErr;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| ObservationErr::OutOfRange(value))
            .and_then(|digit| Self::new(digit).map_err(|_| ObservationErr::OutOfRange(value)))
    }
}

impl FromStr for Observation {
    type Err = ObservationErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| ObservationErr::Parse(s.to_string()))?;

        Self::try_from(value)
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Observation> for u8 {
    fn from(value: Observation) -> Self {
        value.0
    }
}

/// Parses a history of digits separated by whitespace or commas, keeping their order.
pub fn parse_history(text: &str) -> Result<Vec<Observation>, ObservationErr> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(str::parse)
        .collect()
}
