pub mod login_state_machine;
pub mod token_service;

pub use login_state_machine::{LoginOutcome, LoginResponse, LoginStateMachine, MfaRequired};
pub use token_service::{TokenPair, TokenService, ValidatedSession};
