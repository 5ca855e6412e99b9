//! Username/password credentials and the bounded retry around authentication
//!
//! Credentials are an explicit dependency of job submission. A `CredentialCache` keeps the last
//! credentials that were handed out for as long as the cache value lives, so a session of several
//! submissions only asks once, and forgets them as soon as the cluster rejects them.

use std::env;
use std::fmt;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportError};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: Option<String>,
}

impl Credentials {
    pub fn new(username: &str, password: Option<&str>) -> Self {
        Credentials { username: username.to_string(), password: password.map(String::from) }
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}

pub trait CredentialProvider {
    /// Credentials for the given 1-based attempt. Returning an error aborts authentication.
    fn credentials(&mut self, attempt: u32) -> Result<Credentials>;

    /// The last credentials handed out were rejected
    fn reject(&mut self) {}
}

/// The same credentials every time
pub struct StaticCredentials(pub Credentials);

impl CredentialProvider for StaticCredentials {
    fn credentials(&mut self, _attempt: u32) -> Result<Credentials> {
        Ok(self.0.clone())
    }
}

/// Read `QARRAY_USER` (falling back to `USER`) and `QARRAY_PASSWORD`
///
/// Environment variables can't change between attempts, so a rejection is final.
#[derive(Default)]
pub struct EnvCredentials {
    rejected: bool,
}

impl CredentialProvider for EnvCredentials {
    fn credentials(&mut self, attempt: u32) -> Result<Credentials> {
        if self.rejected {
            return Err(Error::Authentication {
                attempts: attempt.saturating_sub(1),
                message: "credentials from the environment were rejected".to_string(),
            });
        }
        let username = env::var("QARRAY_USER").or_else(|_| env::var("USER")).unwrap_or_default();
        let password = env::var("QARRAY_PASSWORD").ok();
        Ok(Credentials { username, password })
    }

    fn reject(&mut self) {
        self.rejected = true;
    }
}

/// Remember credentials from `provider` until they are rejected
pub struct CredentialCache<P: CredentialProvider> {
    provider: P,
    cached: Option<Credentials>,
}

impl<P: CredentialProvider> CredentialCache<P> {
    pub fn new(provider: P) -> Self {
        CredentialCache { provider, cached: None }
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }
}

impl<P: CredentialProvider> CredentialProvider for CredentialCache<P> {
    fn credentials(&mut self, attempt: u32) -> Result<Credentials> {
        if let Some(credentials) = &self.cached {
            return Ok(credentials.clone());
        }
        let credentials = self.provider.credentials(attempt)?;
        self.cached = Some(credentials.clone());
        Ok(credentials)
    }

    fn reject(&mut self) {
        self.cached = None;
        self.provider.reject();
    }
}

/// Run `op` against the transport, re-authenticating on rejection up to `attempts` times
///
/// Only authentication failures are retried; any other transport error is returned straight away.
pub fn authenticated<R>(
    transport: &mut dyn Transport,
    provider: &mut dyn CredentialProvider,
    attempts: u32,
    mut op: impl FnMut(&mut dyn Transport) -> std::result::Result<R, TransportError>,
) -> Result<R> {
    let mut last = String::from("no attempts allowed");
    for attempt in 1..=attempts {
        let credentials = provider.credentials(attempt)?;
        transport.authenticate(&credentials)?;
        match op(&mut *transport) {
            Err(TransportError::Authentication(message)) => {
                warn!("Authentication attempt {attempt}/{attempts} as '{}' rejected: {message}", credentials.username);
                provider.reject();
                last = message;
            }
            Err(err) => return Err(err.into()),
            Ok(value) => {
                if attempt > 1 {
                    info!("Authenticated as '{}' on attempt {attempt}", credentials.username);
                }
                return Ok(value);
            }
        }
    }
    Err(Error::Authentication { attempts, message: last })
}
