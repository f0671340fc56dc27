//! Stage contract between the host serving framework and the instrumentation
//! layer.
//!
//! A host calls `decode_request -> predict -> encode_response` once per
//! request. Anything implementing [`ServingStage`] can be wrapped by the
//! gateway's `InstrumentedProxy`, which implements the same trait and can be
//! handed back to the host unchanged.

use std::fmt;

/// The three intercepted pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageName {
    DecodeRequest,
    Predict,
    EncodeResponse,
}

impl StageName {
    /// All stages in call order.
    pub const ALL: [StageName; 3] = [
        StageName::DecodeRequest,
        StageName::Predict,
        StageName::EncodeResponse,
    ];

    /// Label value (also the operation name on the stage trait).
    pub fn as_str(self) -> &'static str {
        match self {
            StageName::DecodeRequest => "decode_request",
            StageName::Predict => "predict",
            StageName::EncodeResponse => "encode_response",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single stage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    /// Status label value, HTTP-style.
    pub fn status(self) -> &'static str {
        match self {
            Outcome::Success => "200",
            Outcome::Failure => "500",
        }
    }

    pub fn of<T, E>(res: &std::result::Result<T, E>) -> Self {
        if res.is_ok() {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

/// Operations a host serving framework requires from a stage object.
///
/// All three stages share one error type so a host can propagate failures
/// from any stage through a single path.
pub trait ServingStage {
    type Request;
    type Input;
    type Output;
    type Response;
    type Error;

    /// One-time initialization, called by the host before serving.
    fn setup(&mut self, _device: &str) -> std::result::Result<(), Self::Error> {
        Ok(())
    }

    /// Convert a request payload into model input.
    fn decode_request(
        &self,
        request: Self::Request,
    ) -> std::result::Result<Self::Input, Self::Error>;

    /// Run inference.
    fn predict(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error>;

    /// Convert model output into a response payload.
    fn encode_response(
        &self,
        output: Self::Output,
    ) -> std::result::Result<Self::Response, Self::Error>;

    /// Human-readable stage object name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Run one request through all three stages, the way a host does.
pub fn serve_one<S: ServingStage + ?Sized>(
    stage: &S,
    request: S::Request,
) -> std::result::Result<S::Response, S::Error> {
    let input = stage.decode_request(request)?;
    let output = stage.predict(input)?;
    stage.encode_response(output)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    struct Doubler;

    impl ServingStage for Doubler {
        type Request = i64;
        type Input = i64;
        type Output = i64;
        type Response = String;
        type Error = String;

        fn decode_request(&self, request: i64) -> Result<i64, String> {
            Ok(request)
        }

        fn predict(&self, input: i64) -> Result<i64, String> {
            input.checked_mul(2).ok_or_else(|| "overflow".to_string())
        }

        fn encode_response(&self, output: i64) -> Result<String, String> {
            Ok(output.to_string())
        }
    }

    #[test]
    fn stage_names_round_trip_through_labels() {
        for st in StageName::ALL {
            assert_eq!(StageName::parse(st.as_str()), Some(st));
        }
        assert_eq!(StageName::parse("setup"), None);
    }

    #[test]
    fn outcome_status_labels() {
        assert_eq!(Outcome::of(&Ok::<(), ()>(())).status(), "200");
        assert_eq!(Outcome::of(&Err::<(), ()>(())).status(), "500");
    }

    #[test]
    fn serve_one_runs_stages_in_order() {
        assert_eq!(serve_one(&Doubler, 21).unwrap(), "42");
        assert_eq!(serve_one(&Doubler, i64::MAX).unwrap_err(), "overflow");
    }
}
