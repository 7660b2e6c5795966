//! Session lifecycle engine for the Zo operations console.
//!
//! Owns the authentication state machine, the startup check with its single
//! silent-refresh fallback, the OTP login flow, and the normalization of the
//! backend's login-shaped responses. Persistence lives in
//! [`credential_store`], transport in [`http_gateway`], and the profile
//! mirror in [`identity_sync`]; this crate orchestrates them.

mod error;
mod fsm;
mod login_flow;
mod normalize;
mod otp_entry;
mod session;

pub use error::{AuthError, AuthResult};
pub use fsm::{SessionMachine, SessionMachineInput, SessionMachineState, SessionState};
pub use login_flow::{
    normalize_phone, LoginFlow, LoginStep, DEFAULT_COUNTRY_CODE, PHONE_LEN, RESEND_COOLDOWN_SECS,
};
pub use normalize::{
    auth_user_from_payload, normalize_login_response, normalize_valid_till_ms, LoginPayload,
};
pub use otp_entry::{OtpEntry, OtpEvent, OTP_LEN};
pub use session::{SessionController, StateChange};
