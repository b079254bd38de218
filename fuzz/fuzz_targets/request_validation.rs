#![no_main]

//! Fuzz target for webhook body validation.
//!
//! Arbitrary bytes must never panic the validator, and any body it accepts
//! must carry a non-empty token, channel and message.

use libfuzzer_sys::fuzz_target;
use webhooker_api::{RequestValidator, ValidationError};

fuzz_target!(|data: &[u8]| {
    let validator = RequestValidator::new(4096);

    match validator.validate(Some("application/json"), data) {
        Ok(request) => {
            assert!(data.len() <= 4096);
            assert!(!request.channel.is_empty());
            assert!(!request.token.is_empty());
            assert!(!request.message.is_empty());
        },
        Err(ValidationError::PayloadTooLarge { limit }) => assert!(data.len() > limit),
        Err(e) => {
            // Every rejection renders a client-facing message.
            assert!(!e.to_string().is_empty());
        },
    }
});
