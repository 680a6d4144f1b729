use git2::{Cred, CredentialType, RemoteCallbacks};

use crate::types::Credentials;

/// What the credential callback does when libgit2 asks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CredentialAnswer {
    /// Offer the configured username and token
    UserPass,
    /// The one offer was already rejected
    Rejected,
    /// The remote wants something other than username/password
    Unsupported,
}

impl CredentialAnswer {
    pub(super) fn decide(attempted: bool, allowed: CredentialType) -> Self {
        if attempted {
            CredentialAnswer::Rejected
        } else if allowed.is_user_pass_plaintext() {
            CredentialAnswer::UserPass
        } else {
            CredentialAnswer::Unsupported
        }
    }
}

/// Remote callbacks carrying optional basic-auth credentials.
///
/// libgit2 keeps asking for credentials while the server rejects them, so the
/// callback answers once and then fails the operation.
pub(super) fn remote_callbacks<'a>(credentials: Option<&Credentials>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();

    if let Some(creds) = credentials.cloned() {
        let mut attempted = false;
        callbacks.credentials(move |_url, _username_from_url, allowed| {
            let answer = CredentialAnswer::decide(attempted, allowed);
            attempted = true;

            match answer {
                CredentialAnswer::UserPass => Cred::userpass_plaintext(&creds.username, &creds.token),
                CredentialAnswer::Rejected => Err(git2::Error::from_str(
                    "authentication failed: credentials were rejected",
                )),
                CredentialAnswer::Unsupported => Err(git2::Error::from_str(
                    "remote does not accept username/token authentication",
                )),
            }
        });
    }

    callbacks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_offers_user_pass() {
        assert_eq!(
            CredentialAnswer::decide(false, CredentialType::USER_PASS_PLAINTEXT),
            CredentialAnswer::UserPass
        );
        assert_eq!(
            CredentialAnswer::decide(false, CredentialType::USER_PASS_PLAINTEXT | CredentialType::DEFAULT),
            CredentialAnswer::UserPass
        );
    }

    #[test]
    fn test_second_request_gives_up() {
        assert_eq!(
            CredentialAnswer::decide(true, CredentialType::USER_PASS_PLAINTEXT),
            CredentialAnswer::Rejected
        );
        assert_eq!(
            CredentialAnswer::decide(true, CredentialType::SSH_KEY),
            CredentialAnswer::Rejected
        );
    }

    #[test]
    fn test_ssh_only_remote_is_unsupported() {
        assert_eq!(
            CredentialAnswer::decide(false, CredentialType::SSH_KEY),
            CredentialAnswer::Unsupported
        );
    }
}
