//! Sign-in and sign-up form state.

use super::{AuthError, AuthResult, IdentityBackend};
use crate::model::identity::Identity;

/// Email/password form shared by the login and register screens.
///
/// Failures leave the fields untouched so the user can correct them;
/// the message is kept in `error` for inline display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthForm {
    pub email: String,
    pub password: String,
    pub error: Option<String>,
    pub submitting: bool,
}

impl AuthForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn sign_in(&mut self, backend: &dyn IdentityBackend) -> AuthResult<Identity> {
        self.submit(|email, password| backend.sign_in(email, password))
    }

    pub fn sign_up(&mut self, backend: &dyn IdentityBackend) -> AuthResult<Identity> {
        self.submit(|email, password| backend.sign_up(email, password))
    }

    fn submit(
        &mut self,
        call: impl FnOnce(&str, &str) -> AuthResult<Identity>,
    ) -> AuthResult<Identity> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(self.fail(AuthError::MissingFields));
        }

        self.error = None;
        self.submitting = true;
        let result = call(self.email.trim(), self.password.as_str());
        self.submitting = false;

        result.map_err(|err| self.fail(err))
    }

    fn fail(&mut self, err: AuthError) -> AuthError {
        self.error = Some(err.to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::AuthForm;
    use crate::auth::{AuthError, IdentityBackend, LocalIdentityBackend};

    #[test]
    fn empty_fields_fail_without_calling_backend() {
        let backend = LocalIdentityBackend::new();
        backend.set_offline(true);

        let mut form = AuthForm::with_credentials("a@x.com", "");
        let err = form.sign_in(&backend).unwrap_err();
        assert_eq!(err, AuthError::MissingFields);
        assert_eq!(form.error.as_deref(), Some("Please fill in all fields"));
    }

    #[test]
    fn failed_sign_in_keeps_fields_and_shows_message() {
        let backend = LocalIdentityBackend::new();
        backend.sign_up("a@x.com", "secret1").unwrap();
        backend.sign_out().unwrap();

        let mut form = AuthForm::with_credentials("a@x.com", "nope");
        assert_eq!(form.sign_in(&backend), Err(AuthError::InvalidCredentials));
        assert_eq!(form.email, "a@x.com");
        assert_eq!(form.error.as_deref(), Some("Invalid email or password."));
        assert!(!form.submitting);

        form.password = "secret1".to_string();
        let identity = form.sign_in(&backend).unwrap();
        assert_eq!(identity.email, "a@x.com");
        assert_eq!(form.error, None);
    }
}
