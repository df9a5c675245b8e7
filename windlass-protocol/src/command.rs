//! Command channel grammar
//!
//! Commands arrive as short strings on a single channel. Keywords are
//! matched case-insensitively after trimming whitespace:
//!
//! ```text
//! autoDrop        begin staged deployment
//! autoRetrieve    slack-gated raise down to the retrieve remainder
//! drop            single deploy to depth + drop offset
//! raise<N>        raise N metres (e.g. "raise5", "raise 2.5")
//! lower<N>        lower N metres
//! reset           recalibrate the chain counter to zero
//! STOP            unconditional abort
//! ```

/// Longest command string accepted from the channel
pub const MAX_COMMAND_LEN: usize = 32;

/// A parsed windlass command
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Begin staged deployment
    AutoDrop,
    /// Slack-gated retrieval to the near-anchor remainder
    AutoRetrieve,
    /// Single deploy to depth plus the drop offset
    Drop,
    /// Raise by a relative amount in metres
    Raise(f32),
    /// Lower by a relative amount in metres
    Lower(f32),
    /// Recalibrate the chain counter to zero
    ResetCounter,
    /// Unconditional abort
    Stop,
}

/// Errors produced while parsing a command string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Empty or whitespace-only input
    Empty,
    /// Input longer than [`MAX_COMMAND_LEN`]
    TooLong,
    /// Keyword not recognised
    UnknownCommand,
    /// `raise`/`lower` without a number
    MissingAmount,
    /// Amount is not a finite positive number
    InvalidAmount,
}

impl Command {
    /// Parse a command string from the command channel
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(ParseError::Empty);
        }
        if input.len() > MAX_COMMAND_LEN {
            return Err(ParseError::TooLong);
        }

        if input.eq_ignore_ascii_case("stop") {
            return Ok(Command::Stop);
        }
        if input.eq_ignore_ascii_case("autoDrop") {
            return Ok(Command::AutoDrop);
        }
        if input.eq_ignore_ascii_case("autoRetrieve") {
            return Ok(Command::AutoRetrieve);
        }
        if input.eq_ignore_ascii_case("drop") {
            return Ok(Command::Drop);
        }
        if input.eq_ignore_ascii_case("reset") {
            return Ok(Command::ResetCounter);
        }

        if let Some(rest) = strip_keyword(input, "raise") {
            return parse_amount(rest).map(Command::Raise);
        }
        if let Some(rest) = strip_keyword(input, "lower") {
            return parse_amount(rest).map(Command::Lower);
        }

        Err(ParseError::UnknownCommand)
    }

    /// Check if this is the unconditional abort
    ///
    /// STOP is the only command accepted while a movement is active.
    pub fn is_stop(&self) -> bool {
        matches!(self, Command::Stop)
    }

    /// Short name for logging and status reporting
    pub fn name(&self) -> &'static str {
        match self {
            Command::AutoDrop => "autoDrop",
            Command::AutoRetrieve => "autoRetrieve",
            Command::Drop => "drop",
            Command::Raise(_) => "raise",
            Command::Lower(_) => "lower",
            Command::ResetCounter => "reset",
            Command::Stop => "STOP",
        }
    }
}

impl core::str::FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}

/// Strip a case-insensitive keyword prefix
fn strip_keyword<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    let head = input.get(..keyword.len())?;
    if head.eq_ignore_ascii_case(keyword) {
        input.get(keyword.len()..)
    } else {
        None
    }
}

/// Parse the numeric suffix of `raiseN`/`lowerN`
fn parse_amount(rest: &str) -> Result<f32, ParseError> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(ParseError::MissingAmount);
    }

    let amount: f32 = rest.parse().map_err(|_| ParseError::InvalidAmount)?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ParseError::InvalidAmount);
    }

    Ok(amount)
}
