//! Mail collaborator
//!
//! Delivery seam for outbound mail. No real provider is wired up; the reset
//! token is logged so operators can complete the flow manually.

/// Notify a user that a password reset was requested.
///
/// TODO: plug in an SMTP provider once one is provisioned; until then the
/// token is only visible in the service logs.
pub fn send_password_reset(email: &str, token: &str) {
    tracing::info!(email = %email, token = %token, "Password reset token issued");
}
