//! Request and response payloads for the service surface.

use keyfold_core::{Account, AuthRecord, Session};
use serde::{Deserialize, Serialize};

/// What an email verification token authorizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailPurpose {
    Signup,
    Recover,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub purpose: EmailPurpose,
}

/// The issued verification token, handed to the mail-delivery collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmailVerification {
    pub token: String,
    pub email: String,
    pub purpose: EmailPurpose,
}

/// `initAuth` response: the (possibly simulated) auth record plus the
/// server's ephemeral public value `B`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitAuthResponse {
    pub auth: AuthRecord,
    #[serde(with = "keyfold_crypto::b64")]
    pub b: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// The account's email, as used in `initAuth`.
    pub account: String,
    /// Client ephemeral public value `A`.
    #[serde(with = "keyfold_crypto::b64")]
    pub a: Vec<u8>,
    /// Client proof `M1`.
    #[serde(with = "keyfold_crypto::b64")]
    pub m: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session: Session,
    /// Server proof `M2`, authenticating the server to the client.
    #[serde(with = "keyfold_crypto::b64")]
    pub server_proof: Vec<u8>,
}

/// Reference to an invite presented during signup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InviteRef {
    pub org: String,
    pub id: String,
    #[serde(with = "keyfold_crypto::b64")]
    pub proof: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub account: Account,
    pub auth: AuthRecord,
    /// Email verification token from `verifyEmail`.
    pub verify: String,
    pub invite: Option<InviteRef>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecoverAccountRequest {
    pub account: Account,
    pub auth: AuthRecord,
    /// Email verification token with `recover` purpose.
    pub verify: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateVaultRequest {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetInviteRequest {
    pub org: String,
    pub id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcceptInviteRequest {
    pub org: String,
    pub id: String,
    /// The invitee's proof of holding the invite token.
    #[serde(with = "keyfold_crypto::b64")]
    pub proof: Vec<u8>,
}
