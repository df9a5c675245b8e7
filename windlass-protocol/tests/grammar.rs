//! Property tests for the command grammar

use proptest::prelude::*;
use windlass_protocol::{Command, ParseError, MAX_COMMAND_LEN};

proptest! {
    #[test]
    fn parse_never_panics(input in ".{0,64}") {
        let _ = Command::parse(&input);
    }

    #[test]
    fn accepted_amounts_are_positive(input in "(raise|lower|RAISE|Lower) ?-?[0-9]{0,4}(\\.[0-9]{0,3})?") {
        match Command::parse(&input) {
            Ok(Command::Raise(amount)) | Ok(Command::Lower(amount)) => {
                prop_assert!(amount.is_finite() && amount > 0.0);
            }
            Ok(other) => prop_assert!(false, "unexpected command {:?}", other),
            Err(e) => prop_assert!(matches!(
                e,
                ParseError::MissingAmount | ParseError::InvalidAmount
            )),
        }
    }

    #[test]
    fn only_stop_parses_as_stop(input in "[a-zA-Z ]{1,16}") {
        if let Ok(command) = Command::parse(&input) {
            prop_assert_eq!(command.is_stop(), input.trim().eq_ignore_ascii_case("stop"));
        }
    }

    #[test]
    fn long_input_rejected(pad in MAX_COMMAND_LEN + 1..128usize) {
        let input = "x".repeat(pad);
        prop_assert_eq!(Command::parse(&input), Err(ParseError::TooLong));
    }
}
