use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// OTP-mediated password change for an authenticated user. The pending code
/// is keyed by the caller's own email.
#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: String,
    pub new_password: String,
}
