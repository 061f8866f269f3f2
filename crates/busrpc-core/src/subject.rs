//! Subject naming.
//!
//! Every call uses three subjects:
//!
//! - the **method subject**, shared by all callers of a method, where the
//!   opening request of each call is sent;
//! - the **request subject**, unique to one call, for the rest of the
//!   client's messages;
//! - the **response subject**, unique to one call, for the server's replies.
//!
//! The method path's `/` separators become `.` subject delimiters. For the
//! method `/svc/Echo` in the default `nrpc` namespace:
//!
//! | Subject  | Name                        |
//! |----------|-----------------------------|
//! | method   | `nrpc.svc.Echo`             |
//! | request  | `nrpc.req.svc.Echo.<token>` |
//! | response | `nrpc.resp.svc.Echo.<token>`|
//!
//! The token is random, fixed-length, and shared by the request and response
//! subjects of a call so the pair is correlated. Servers derive the same
//! names, so the format must not change.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Default subject namespace.
pub const DEFAULT_NAMESPACE: &str = "nrpc";

/// Default length of the random call token.
pub const DEFAULT_TOKEN_LEN: usize = 16;

/// The three subjects of one call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSubjects {
    /// Shared method subject.
    pub method: String,
    /// Ephemeral subject for client-to-server messages after the handshake.
    pub request: String,
    /// Ephemeral subject for server-to-client messages.
    pub response: String,
}

/// Derives method and per-call subjects within a namespace.
#[derive(Debug, Clone)]
pub struct SubjectNamer {
    namespace: String,
    token_len: usize,
}

impl Default for SubjectNamer {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl SubjectNamer {
    /// Create a namer for `namespace` with the default token length.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            token_len: DEFAULT_TOKEN_LEN,
        }
    }

    /// Set the random token length.
    #[must_use]
    pub const fn with_token_len(mut self, token_len: usize) -> Self {
        self.token_len = token_len;
        self
    }

    /// The namespace prefix.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The random token length.
    #[must_use]
    pub const fn token_len(&self) -> usize {
        self.token_len
    }

    /// The method subject for `method`.
    #[must_use]
    pub fn method_subject(&self, method: &str) -> String {
        format!("{}{}", self.namespace, subject_path(method))
    }

    /// Fresh call subjects for `method`, using the thread-local RNG.
    #[must_use]
    pub fn call_subjects(&self, method: &str) -> CallSubjects {
        self.call_subjects_with(method, &mut rand::thread_rng())
    }

    /// Fresh call subjects for `method`, drawing the token from `rng`.
    pub fn call_subjects_with<R: Rng>(&self, method: &str, rng: &mut R) -> CallSubjects {
        let path = subject_path(method);
        let token = random_token(rng, self.token_len);
        CallSubjects {
            method: format!("{}{path}", self.namespace),
            request: format!("{}.req{path}.{token}", self.namespace),
            response: format!("{}.resp{path}.{token}", self.namespace),
        }
    }
}

/// Transliterate a method path into subject tokens.
fn subject_path(method: &str) -> String {
    method.replace('/', ".")
}

/// An alphanumeric token of `len` characters drawn from `rng`.
pub fn random_token<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}
