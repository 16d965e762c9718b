use thiserror::Error;

/// Failure inside the credential vault. Distinct from "no credential
/// stored", which is an ordinary `Ok(None)` from the store.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Database error (open, query, write).
    #[error("vault storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Encryption, decryption, or encoding failure on a stored value.
    #[error("vault crypto error: {0}")]
    Crypto(String),
}

/// Everything `AgentClient::execute` can fail with. One variant per
/// user-distinguishable outcome; the CLI maps each to its own message.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No API key in the vault. Checked before any network call.
    #[error("no API key configured")]
    MissingCredential,

    /// The create-job call returned a non-success HTTP status. Never
    /// retried: resubmitting could duplicate a financial action.
    #[error("submission rejected with HTTP {status}: {body}")]
    Submission { status: u16, body: String },

    /// Network-level failure before any HTTP status existed (DNS, refused
    /// connection, request timeout) on the submission path. Poll-side
    /// transport failures are treated as transient instead.
    #[error("could not reach the agent API: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote job itself reported failure.
    #[error("job failed: {0}")]
    JobFailed(String),

    /// The poll ceiling was exhausted with no terminal status. The true
    /// outcome is unknown: the remote action may still have gone through.
    #[error("no result after {attempts} poll attempts")]
    TimedOut { attempts: u32 },

    /// Credential vault I/O or crypto failure.
    #[error(transparent)]
    Vault(#[from] VaultError),
}
