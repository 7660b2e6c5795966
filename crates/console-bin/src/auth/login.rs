//! Interactive OTP login command.

use std::time::Instant;

use auth_engine::{LoginFlow, LoginStep};
use tracing::debug;

use super::prompt;
use crate::state::ConsoleState;

/// Run the interactive login: phone entry, OTP entry, session established.
pub async fn run(state: &ConsoleState) -> anyhow::Result<()> {
    state.controller.initialize().await?;

    if state.controller.is_logged_in() {
        let user = state.controller.current_user();
        println!(
            "Already logged in{}.",
            user.map(|u| format!(" as {}", u.id)).unwrap_or_default()
        );
        println!("Run `zo-console logout` first to switch accounts.");
        return Ok(());
    }

    let mut flow = LoginFlow::new(state.gateway.clone(), state.controller.clone());
    let mut last_tick = Instant::now();

    loop {
        match flow.step() {
            LoginStep::Phone => {
                let raw = prompt("Mobile number (10 digits): ")?;
                flow.set_phone(&raw);
                match flow.request_otp().await {
                    Ok(()) => {
                        println!("OTP sent via SMS to {}.", flow.phone());
                        last_tick = Instant::now();
                    }
                    Err(e) => println!("{}", e.user_message()),
                }
            }
            LoginStep::Otp => {
                let raw = prompt("6-digit code ('resend' / 'change' / 'quit'): ")?;

                // The cooldown is wall-clock driven; catch the flow up to now
                for _ in 0..last_tick.elapsed().as_secs() {
                    flow.tick_resend();
                }
                last_tick = Instant::now();

                match raw.as_str() {
                    "quit" => {
                        println!("Login cancelled.");
                        return Ok(());
                    }
                    "change" => {
                        flow.change_phone();
                    }
                    "resend" => {
                        if flow.can_resend() {
                            match flow.resend_otp().await {
                                Ok(()) => println!("OTP re-sent."),
                                Err(e) => println!("{}", e.user_message()),
                            }
                        } else {
                            println!(
                                "Wait {}s before requesting another code.",
                                flow.resend_cooldown()
                            );
                        }
                    }
                    code => match flow.paste_otp(code).await {
                        Ok(true) => {
                            let user = state.controller.current_user();
                            println!(
                                "Logged in{}.",
                                user.map(|u| format!(" as {}", u.id)).unwrap_or_default()
                            );
                            return Ok(());
                        }
                        Ok(false) => {
                            debug!("Partial code entered");
                            println!("Enter all 6 digits.");
                        }
                        Err(e) => println!("{}", e.user_message()),
                    },
                }
            }
        }
    }
}
