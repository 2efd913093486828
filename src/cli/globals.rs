use secrecy::SecretString;

/// Secrets shared by the server: the code pepper and the session signing key.
#[derive(Clone)]
pub struct GlobalArgs {
    pub otp_code_pepper: SecretString,
    pub session_secret: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(otp_code_pepper: SecretString, session_secret: SecretString) -> Self {
        Self {
            otp_code_pepper,
            session_secret,
        }
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("otp_code_pepper", &"***")
            .field("session_secret", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            SecretString::from("p3pp3r".to_string()),
            SecretString::from("s3ss10n".to_string()),
        );
        assert_eq!(args.otp_code_pepper.expose_secret(), "p3pp3r");
        assert_eq!(args.session_secret.expose_secret(), "s3ss10n");

        let rendered = format!("{args:?}");
        assert!(!rendered.contains("p3pp3r"));
        assert!(!rendered.contains("s3ss10n"));
    }
}
