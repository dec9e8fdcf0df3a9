use crate::config::Config;
use crate::models::{ServiceError, TokenUser};
use actix_web::{HttpMessage, HttpRequest};
use log::error;
use subtle::ConstantTimeEq;

pub mod auth_middleware;
pub mod jwt;
pub mod rate_limit;

pub use auth_middleware::Authentication;
pub use rate_limit::RateLimit;

// Verified session attached to the request by the authentication middleware
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user: TokenUser,
    pub token: String,
}

// Helper to read the verified session from request extensions
pub fn get_session_from_request(req: &HttpRequest) -> Result<SessionContext, ServiceError> {
    req.extensions()
        .get::<SessionContext>()
        .cloned()
        .ok_or_else(|| {
            error!("❌ No session on request, is the route behind Authentication?");
            ServiceError::Unauthorized
        })
}

pub fn require_admin(session: &SessionContext) -> Result<(), ServiceError> {
    if session.user.is_admin {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized)
    }
}

// Internal routes are closed unless LOCAL_SERVICE_KEY is configured
pub fn require_local_service(req: &HttpRequest, config: &Config) -> Result<(), ServiceError> {
    let expected = config.local_service_key.as_deref().ok_or(ServiceError::Unauthorized)?;
    let supplied = req
        .headers()
        .get("X-Local-Service-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if bool::from(expected.as_bytes().ct_eq(supplied.as_bytes())) {
        Ok(())
    } else {
        error!("❌ Rejected internal call with a bad service key");
        Err(ServiceError::Unauthorized)
    }
}

// Password utility functions
pub mod password {
    use crate::models::ServiceError;
    use bcrypt::{hash, verify};

    #[cfg(not(test))]
    const HASH_COST: u32 = bcrypt::DEFAULT_COST;
    #[cfg(test)]
    const HASH_COST: u32 = 4;

    pub fn hash_password(password: &str) -> Result<String, ServiceError> {
        Ok(hash(password, HASH_COST)?)
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
        Ok(verify(password, hash)?)
    }
}

// One-time passcodes
pub mod otp {
    use rand::Rng;
    use subtle::ConstantTimeEq;

    pub const OTP_MIN: u32 = 100_000;
    pub const OTP_MAX: u32 = 999_999;

    pub fn generate_otp() -> String {
        rand::thread_rng().gen_range(OTP_MIN..=OTP_MAX).to_string()
    }

    pub fn verify_otp(expected: &str, supplied: &str) -> bool {
        bool::from(expected.as_bytes().ct_eq(supplied.as_bytes()))
    }
}

// Cookie helpers for the session tokens
pub mod cookies {
    use crate::utils::jwt::REFRESH_TOKEN_TTL_DAYS;
    use actix_web::cookie::time::Duration;
    use actix_web::cookie::{Cookie, SameSite};

    pub const ACCESS_COOKIE: &str = "token";
    pub const REFRESH_COOKIE: &str = "refreshToken";

    pub fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
        Cookie::build(name, value)
            .http_only(true)
            .same_site(SameSite::Strict)
            .path("/")
            .max_age(Duration::days(REFRESH_TOKEN_TTL_DAYS))
            .secure(secure)
            .finish()
    }

    pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
        let mut cookie = Cookie::build(name, "").path("/").finish();
        cookie.make_removal();
        cookie
    }
}

/// Request body validation, collecting every failing field.
pub mod validation {
    use crate::models::{FieldError, ServiceError};
    use lazy_static::lazy_static;
    use regex::Regex;

    pub const MAX_CONTACT_MESSAGE_LENGTH: usize = 500;

    lazy_static! {
        static ref EMAIL_REGEX: Regex =
            Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9\-]+(\.[a-zA-Z0-9\-]+)*\.[a-zA-Z]{2,}$")
                .expect("email regex compiles");
        static ref NAME_REGEX: Regex = Regex::new(r"^[-a-zA-Z\s]+$").expect("name regex compiles");
        static ref OTP_REGEX: Regex = Regex::new(r"^\d{6}$").expect("otp regex compiles");
    }

    #[derive(Default)]
    pub struct Validator {
        errors: Vec<FieldError>,
    }

    impl Validator {
        pub fn new() -> Self {
            Self::default()
        }

        fn fail(&mut self, field: &str, message: &str) {
            self.errors.push(FieldError::new(field, message));
        }

        /// Lowercases and checks an email address, returning the normalised form.
        pub fn email(&mut self, field: &str, raw: &str) -> String {
            let email = raw.trim().to_lowercase();
            if !EMAIL_REGEX.is_match(&email) {
                self.fail(field, "Invalid email address");
            }
            email
        }

        // Title-cases and trims a person's name
        pub fn name(&mut self, field: &str, raw: &str) -> String {
            let name = title_case(raw).trim().to_string();
            if !NAME_REGEX.is_match(&name) {
                self.fail(field, "Name must contain only letters");
            }
            name
        }

        pub fn new_password(&mut self, password: &str, confirm: &str) {
            if !is_strong_password(password) {
                self.fail(
                    "password",
                    "Password must contain at least 8 characters, one uppercase letter, \
                     one lowercase letter, one number, and one special character",
                );
            }
            if password != confirm {
                self.fail("confirmPassword", "Passwords do not match");
            }
        }

        pub fn required(&mut self, field: &str, value: &str, message: &str) {
            if value.is_empty() {
                self.fail(field, message);
            }
        }

        pub fn otp(&mut self, field: &str, otp: &str) {
            if !OTP_REGEX.is_match(otp) {
                self.fail(field, "OTP must be 6 characters long");
            }
        }

        pub fn min_len(&mut self, field: &str, value: &str, min: usize, message: &str) {
            if value.trim().chars().count() < min {
                self.fail(field, message);
            }
        }

        pub fn max_len(&mut self, field: &str, value: &str, max: usize, message: &str) {
            if value.trim().chars().count() > max {
                self.fail(field, message);
            }
        }

        pub fn finish(self) -> Result<(), ServiceError> {
            if self.errors.is_empty() {
                Ok(())
            } else {
                Err(ServiceError::Validation(self.errors))
            }
        }
    }

    fn title_case(raw: &str) -> String {
        raw.split_inclusive(char::is_whitespace)
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                    None => String::new(),
                }
            })
            .collect()
    }

    // At least 8 chars with upper, lower, digit and a non-space symbol
    pub fn is_strong_password(password: &str) -> bool {
        password.chars().count() >= 8
            && password.chars().any(|c| c.is_ascii_uppercase())
            && password.chars().any(|c| c.is_ascii_lowercase())
            && password.chars().any(|c| c.is_ascii_digit())
            && password.chars().any(|c| !c.is_ascii_alphanumeric() && !c.is_whitespace())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn names_are_title_cased_and_checked() {
            let mut v = Validator::new();
            assert_eq!(v.name("fname", "  aLICE  "), "Alice");
            assert_eq!(v.name("lname", "smith-jones"), "Smith-jones");
            assert!(v.finish().is_ok());

            let mut v = Validator::new();
            v.name("fname", "R2D2");
            assert!(matches!(v.finish(), Err(ServiceError::Validation(f)) if f[0].field == "fname"));
        }

        #[test]
        fn emails_are_lowercased() {
            let mut v = Validator::new();
            assert_eq!(v.email("email", "Alice@X.com"), "alice@x.com");
            v.email("email", "not-an-email");
            assert!(v.finish().is_err());
        }

        #[test]
        fn padded_otps_fail_validation() {
            let mut v = Validator::new();
            v.otp("otp", "123456");
            assert!(v.finish().is_ok());

            let mut v = Validator::new();
            v.otp("otp", " 123456 ");
            assert!(matches!(v.finish(), Err(ServiceError::Validation(f)) if f[0].field == "otp"));
        }

        #[test]
        fn password_rules() {
            assert!(is_strong_password("P@ssw0rd!"));
            assert!(!is_strong_password("password1!"));
            assert!(!is_strong_password("Sh0rt!"));
            assert!(!is_strong_password("NoSymbols123"));

            let mut v = Validator::new();
            v.new_password("P@ssw0rd!", "P@ssw0rd?");
            match v.finish() {
                Err(ServiceError::Validation(fields)) => {
                    assert_eq!(fields, vec![FieldError::new("confirmPassword", "Passwords do not match")])
                }
                other => panic!("unexpected: {:?}", other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::otp::*;

    #[test]
    fn otps_are_six_digits_in_range() {
        for _ in 0..1000 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            let value: u32 = otp.parse().unwrap();
            assert!((OTP_MIN..=OTP_MAX).contains(&value));
        }
    }

    #[test]
    fn otp_must_match_exactly() {
        assert!(verify_otp("123456", "123456"));
        assert!(!verify_otp("123456", " 123456 "));
        assert!(!verify_otp("123456", "123457"));
        assert!(!verify_otp("123456", "12345"));
    }
}
