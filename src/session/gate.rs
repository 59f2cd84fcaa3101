//! Disclaimer gate

use thiserror::Error;

pub const DISCLAIMER: &str = "\
This application uses voice data, including examples from individuals diagnosed with \
Alzheimer's disease, to support early detection research and awareness. It is designed \
for educational and assistive purposes only and should not be used as a substitute for \
professional medical diagnosis or advice.

If you have any concerns or notice possible symptoms, please consult a qualified healthcare \
professional. The creators and developers of this app cannot be held responsible for any \
decisions, outcomes, or actions taken based on the information provided by this tool.";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("The disclaimer must be accepted before analysing audio")]
    DisclaimerPending,
}

/// Settings a session is opened with
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub disclaimer_accepted: bool,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disclaimer_accepted(mut self, accepted: bool) -> Self {
        self.disclaimer_accepted = accepted;
        self
    }

    pub(crate) fn check(&self) -> Result<(), GateError> {
        if self.disclaimer_accepted {
            Ok(())
        } else {
            Err(GateError::DisclaimerPending)
        }
    }
}
