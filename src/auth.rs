// src/auth.rs
// Signed-in identity, passed explicitly to whatever needs it.
// Sign-in itself belongs to the external identity provider; this only
// holds its result.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    /// Bearer token presented to the server when its gate is enabled
    pub token: Option<String>,
}

impl Identity {
    pub fn new(email: impl Into<String>, token: Option<String>) -> Self {
        Self {
            email: email.into(),
            token,
        }
    }
}

/// Current-user state. Established by `sign_in`, cleared by `sign_out`,
/// read-only everywhere else.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    identity: Option<Identity>,
}

impl AuthContext {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn sign_in(&mut self, identity: Identity) {
        tracing::info!("Signed in as {}", identity.email);
        self.identity = Some(identity);
    }

    pub fn sign_out(&mut self) {
        if let Some(identity) = self.identity.take() {
            tracing::info!("Signed out {}", identity.email);
        }
    }

    pub fn current(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }
}
