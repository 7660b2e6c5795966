//! Two-step OTP login flow: phone entry, then code entry.
//!
//! Owns the phone buffer, the [`OtpEntry`] widget state, the resend
//! cooldown and the last error line. Network calls go through the gateway;
//! a successful verify hands the normalized session to the controller.

use crate::normalize::{auth_user_from_payload, normalize_login_response};
use crate::otp_entry::{OtpEntry, OtpEvent};
use crate::session::SessionController;
use crate::{AuthError, AuthResult};
use http_gateway::HttpGateway;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Country code applied when the caller does not choose one.
pub const DEFAULT_COUNTRY_CODE: &str = "91";

/// Digits expected in a mobile number.
pub const PHONE_LEN: usize = 10;

/// Seconds before the resend link re-arms after an OTP is sent.
pub const RESEND_COOLDOWN_SECS: u32 = 30;

/// Which screen the flow is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    Phone,
    Otp,
}

/// Strip non-digits and cap at ten. Pure; applied on every keystroke.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_digit)
        .take(PHONE_LEN)
        .collect()
}

/// The interactive login flow.
pub struct LoginFlow {
    gateway: Arc<HttpGateway>,
    controller: Arc<SessionController>,
    step: LoginStep,
    country_code: String,
    phone: String,
    otp: OtpEntry,
    resend_cooldown: u32,
    error: Option<String>,
}

impl LoginFlow {
    /// Start a flow on the phone screen with the default country code.
    pub fn new(gateway: Arc<HttpGateway>, controller: Arc<SessionController>) -> Self {
        Self {
            gateway,
            controller,
            step: LoginStep::Phone,
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
            phone: String::new(),
            otp: OtpEntry::new(),
            resend_cooldown: 0,
            error: None,
        }
    }

    pub fn step(&self) -> LoginStep {
        self.step
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn otp(&self) -> &OtpEntry {
        &self.otp
    }

    pub fn resend_cooldown(&self) -> u32 {
        self.resend_cooldown
    }

    /// Replace the phone buffer with the normalized form of `raw`.
    pub fn set_phone(&mut self, raw: &str) {
        self.phone = normalize_phone(raw);
    }

    pub fn set_country_code(&mut self, code: impl Into<String>) {
        self.country_code = code.into();
    }

    /// Submission is enabled only for a full ten-digit number.
    pub fn can_submit_phone(&self) -> bool {
        self.phone.len() == PHONE_LEN
    }

    /// Request an OTP for the entered number and move to the code screen.
    pub async fn request_otp(&mut self) -> AuthResult<()> {
        if !self.can_submit_phone() {
            let err = AuthError::InvalidPhoneNumber;
            self.error = Some(err.user_message());
            return Err(err);
        }

        self.send_otp().await?;
        self.step = LoginStep::Otp;
        self.otp.clear();
        Ok(())
    }

    /// Re-send the OTP. Only valid on the code screen once the cooldown hit
    /// zero; rearms the cooldown on success.
    pub async fn resend_otp(&mut self) -> AuthResult<()> {
        if !self.can_resend() {
            return Ok(());
        }
        self.send_otp().await
    }

    async fn send_otp(&mut self) -> AuthResult<()> {
        let body = json!({
            "mobile_country_code": self.country_code,
            "mobile_number": self.phone,
            "message_channel": "sms",
        });

        match self.gateway.post_json("/auth/login/mobile/otp/", &body).await {
            Ok(_) => {
                info!(mobile_number = %self.phone, "OTP requested");
                self.resend_cooldown = RESEND_COOLDOWN_SECS;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                warn!("OTP request failed: {}", e);
                let err = AuthError::from(e);
                self.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// One-second cooldown tick.
    pub fn tick_resend(&mut self) {
        self.resend_cooldown = self.resend_cooldown.saturating_sub(1);
    }

    pub fn can_resend(&self) -> bool {
        self.step == LoginStep::Otp && self.resend_cooldown == 0
    }

    /// Type a digit into the OTP widget, auto-submitting on the sixth.
    ///
    /// Returns whether a submission was made.
    pub async fn type_otp_digit(&mut self, c: char) -> AuthResult<bool> {
        if self.otp.type_digit(c) == OtpEvent::Complete {
            self.verify_otp().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Paste into the OTP widget, auto-submitting when six digits arrived.
    pub async fn paste_otp(&mut self, text: &str) -> AuthResult<bool> {
        if self.otp.paste(text) == OtpEvent::Complete {
            self.verify_otp().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Submit the entered code.
    ///
    /// On success the controller takes over (persist, state transition,
    /// background identity sync). On failure the six slots are cleared, the
    /// focus returns to the first slot and the backend's message (or a
    /// generic line) is surfaced.
    pub async fn verify_otp(&mut self) -> AuthResult<()> {
        let code = match self.otp.code() {
            Some(code) => code,
            None => {
                let err = AuthError::IncompleteOtp;
                self.error = Some(err.user_message());
                return Err(err);
            }
        };

        let body = json!({
            "mobile_country_code": self.country_code,
            "mobile_number": self.phone,
            "otp": code,
        });

        debug!(mobile_number = %self.phone, "Verifying OTP");
        let response = match self.gateway.post_json("/auth/login/mobile/", &body).await {
            Ok(response) => response,
            Err(e) => {
                warn!("OTP verify failed: {}", e);
                return Err(self.fail_verify(AuthError::from(e)));
            }
        };

        let payload = normalize_login_response(&response);
        let token = match payload.token {
            Some(token) => token,
            None => {
                warn!("OTP verify response carried no token");
                return Err(self.fail_verify(AuthError::MissingToken));
            }
        };

        let user = auth_user_from_payload(payload.user.as_ref(), &self.country_code, &self.phone);
        self.controller.login(user, &token, payload.valid_till)?;
        self.error = None;
        Ok(())
    }

    fn fail_verify(&mut self, err: AuthError) -> AuthError {
        self.otp.clear();
        self.error = Some(err.user_message());
        err
    }

    /// Back to the phone screen; code, error and cooldown are discarded.
    pub fn change_phone(&mut self) {
        self.step = LoginStep::Phone;
        self.otp.clear();
        self.error = None;
        self.resend_cooldown = 0;
    }
}
