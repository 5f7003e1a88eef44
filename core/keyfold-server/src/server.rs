//! Request handlers for the keyfold service surface.
//!
//! Every handler validates before it persists, so a failed request leaves
//! storage untouched. Authentication failures are deliberately uniform:
//! an unknown account, a stale handshake and a wrong proof all surface as
//! the same `AuthenticationFailed`, after doing the same amount of work.

use crate::config::ServerConfig;
use crate::rate_limit::FailedProofLimiter;
use crate::storage::{BatchEntry, Storage};
use crate::types::*;
use chrono::{DateTime, Duration, Utc};
use keyfold_core::marshal::{self, Storable};
use keyfold_core::srp::{proofs_match, ServerHandshake};
use keyfold_core::{
    random_id, Account, AuthRecord, Error, Invite, Org, OrgMember, Result, Session, Vault,
};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Record kind for the email -> account id index.
const EMAIL_INDEX_KIND: &str = "email-index";

/// A started SRP handshake waiting for the client proof.
struct PendingHandshake {
    /// `None` for simulated (unknown-account) handshakes.
    account_id: Option<String>,
    handshake: ServerHandshake,
    deadline: DateTime<Utc>,
}

struct EmailToken {
    email: String,
    purpose: EmailPurpose,
    expires: DateTime<Utc>,
}

/// The keyfold service.
pub struct Server<S: Storage> {
    config: ServerConfig,
    storage: S,
    /// Secret behind simulated auth records; never persisted or exposed.
    server_secret: Vec<u8>,
    pending: Mutex<HashMap<String, PendingHandshake>>,
    email_tokens: Mutex<HashMap<String, EmailToken>>,
    limiter: Mutex<FailedProofLimiter>,
}

impl<S: Storage> Server<S> {
    pub fn new(config: ServerConfig, storage: S) -> Self {
        let limiter = FailedProofLimiter::new(
            config.rate_limit_window_secs,
            config.rate_limit_max_failures,
        );
        Self {
            config,
            storage,
            server_secret: keyfold_crypto::random_bytes(32),
            pending: Mutex::new(HashMap::new()),
            email_tokens: Mutex::new(HashMap::new()),
            limiter: Mutex::new(limiter),
        }
    }

    // ── Persistence helpers ──

    async fn save<T: Storable>(&self, entity: &T) -> Result<()> {
        self.storage
            .put(T::KIND, entity.id(), marshal::to_record(entity)?)
            .await
    }

    /// Marshals an entity into a `put_batch` entry.
    fn record_entry<T: Storable>(entity: &T) -> Result<BatchEntry> {
        Ok((
            T::KIND.to_string(),
            entity.id().to_string(),
            marshal::to_record(entity)?,
        ))
    }

    async fn load<T: Storable>(&self, id: &str) -> Result<Option<T>> {
        match self.storage.get(T::KIND, id).await? {
            Some(bytes) => Ok(Some(marshal::from_record(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn require<T: Storable>(&self, id: &str) -> Result<T> {
        self.load(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} {id}", T::KIND)))
    }

    async fn account_id_for_email(&self, email: &str) -> Result<Option<String>> {
        Ok(self
            .storage
            .get(EMAIL_INDEX_KIND, email)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn index_email(&self, email: &str, account_id: &str) -> Result<()> {
        self.storage
            .put(EMAIL_INDEX_KIND, email, account_id.as_bytes().to_vec())
            .await
    }

    /// Resolves a session id to its account, failing uniformly for missing,
    /// expired and revoked sessions.
    async fn authenticate(&self, session_id: &str) -> Result<(Session, Account)> {
        let session: Session = self
            .load(session_id)
            .await?
            .ok_or(Error::AuthenticationFailed)?;
        if session.is_expired() {
            self.storage.delete(Session::KIND, session_id).await?;
            return Err(Error::AuthenticationFailed);
        }
        let account: Account = self
            .load(&session.account_id)
            .await?
            .ok_or(Error::AuthenticationFailed)?;
        Ok((session, account))
    }

    // ── Email verification ──

    /// Issues a verification token. Delivery to the inbox belongs to the
    /// mail collaborator; the token is returned for it to send.
    pub async fn verify_email(&self, req: VerifyEmailRequest) -> Result<EmailVerification> {
        let token = random_id();
        self.email_tokens.lock().await.insert(
            token.clone(),
            EmailToken {
                email: req.email.clone(),
                purpose: req.purpose,
                expires: Utc::now() + Duration::seconds(self.config.email_token_ttl_secs),
            },
        );
        debug!(email = %req.email, purpose = ?req.purpose, "email verification issued");
        Ok(EmailVerification {
            token,
            email: req.email,
            purpose: req.purpose,
        })
    }

    /// Consumes a token; valid exactly once.
    async fn consume_email_token(
        &self,
        token: &str,
        email: &str,
        purpose: EmailPurpose,
    ) -> Result<()> {
        let mut tokens = self.email_tokens.lock().await;
        let valid = matches!(
            tokens.get(token),
            Some(t) if t.email == email && t.purpose == purpose && Utc::now() < t.expires
        );
        if !valid {
            return Err(Error::VerificationRequired);
        }
        tokens.remove(token);
        Ok(())
    }

    // ── Auth & sessions ──

    /// Starts a handshake. Always answers: unknown emails get a simulated
    /// record derived from the server secret, so existence is not revealed.
    pub async fn init_auth(&self, email: &str) -> Result<InitAuthResponse> {
        let account_id = self.account_id_for_email(email).await?;
        let auth = match &account_id {
            Some(id) => self.require::<AuthRecord>(id).await?,
            None => AuthRecord::simulated(&self.server_secret, email),
        };

        let handshake = ServerHandshake::new(&auth.verifier);
        let b = handshake.public_b();
        self.pending.lock().await.insert(
            email.to_string(),
            PendingHandshake {
                account_id,
                handshake,
                deadline: Utc::now() + Duration::seconds(self.config.handshake_ttl_secs),
            },
        );
        Ok(InitAuthResponse { auth, b })
    }

    /// Replaces the caller's auth record (password change).
    pub async fn update_auth(&self, session_id: &str, auth: AuthRecord) -> Result<()> {
        let (_, account) = self.authenticate(session_id).await?;
        if auth.account_id != account.id || auth.email != account.email {
            return Err(Error::InsufficientPermissions);
        }
        self.save(&auth).await?;
        info!(account = %account.id, "auth record updated");
        Ok(())
    }

    /// Completes the handshake and mints a session.
    ///
    /// Unknown-account and wrong-proof attempts run the identical code path
    /// and fail with the identical error.
    pub async fn create_session(&self, req: CreateSessionRequest) -> Result<CreateSessionResponse> {
        if self.limiter.lock().await.is_limited(&req.account) {
            return Err(Error::RateLimited);
        }

        let pending = self
            .pending
            .lock()
            .await
            .remove(&req.account)
            .ok_or(Error::AuthenticationFailed)?;

        if Utc::now() > pending.deadline {
            warn!(account = %req.account, "stale handshake discarded");
            return Err(Error::AuthenticationFailed);
        }

        let outcome = pending.handshake.complete(&req.a)?;
        let proof_ok = proofs_match(&req.m, &outcome.client_proof);

        if let (true, Some(account_id)) = (proof_ok, &pending.account_id) {
            let session = Session::new(
                account_id,
                outcome.session_key.as_bytes().to_vec(),
                self.config.session_ttl_secs,
            );
            self.save(&session).await?;
            self.limiter.lock().await.reset(&req.account);
            info!(account = %account_id, session = %session.id, "session created");
            return Ok(CreateSessionResponse {
                session,
                server_proof: outcome.server_proof,
            });
        }

        self.limiter.lock().await.record_failure(&req.account);
        Err(Error::AuthenticationFailed)
    }

    pub async fn revoke_session(&self, session_id: &str) -> Result<()> {
        let session: Session = self.require(session_id).await?;
        self.storage.delete(Session::KIND, &session.id).await?;
        info!(session = %session.id, "session revoked");
        Ok(())
    }

    // ── Accounts ──

    pub async fn create_account(&self, req: CreateAccountRequest) -> Result<Account> {
        self.consume_email_token(&req.verify, &req.account.email, EmailPurpose::Signup)
            .await?;

        if req.auth.account_id != req.account.id || req.auth.email != req.account.email {
            return Err(Error::InvalidRequest(
                "auth record does not match account".to_string(),
            ));
        }
        if self
            .account_id_for_email(&req.account.email)
            .await?
            .is_some()
        {
            return Err(Error::AlreadyExists(format!(
                "account {}",
                req.account.email
            )));
        }

        // Validate invite enrollment fully before persisting anything.
        let enrollment = match &req.invite {
            Some(invite_ref) => Some(
                self.validate_invite(invite_ref, &req.account.email)
                    .await?,
            ),
            None => None,
        };

        // All writes land in one batch, so the account never exists without
        // its auth record (or half of an invite enrollment).
        let mut batch = vec![
            Self::record_entry(&req.account)?,
            Self::record_entry(&req.auth)?,
            (
                EMAIL_INDEX_KIND.to_string(),
                req.account.email.clone(),
                req.account.id.as_bytes().to_vec(),
            ),
        ];

        if let Some((mut invite, mut org)) = enrollment {
            invite.accepted = true;
            org.enroll_pending_member(OrgMember::from_account(&req.account))?;
            batch.push(Self::record_entry(&invite)?);
            batch.push(Self::record_entry(&org)?);
            info!(account = %req.account.id, org = %org.id(), "account enrolled via invite");
        }

        self.storage.put_batch(batch).await?;
        info!(account = %req.account.id, "account created");
        Ok(req.account)
    }

    pub async fn get_account(&self, session_id: &str) -> Result<Account> {
        let (_, account) = self.authenticate(session_id).await?;
        Ok(account)
    }

    pub async fn update_account(&self, session_id: &str, account: Account) -> Result<Account> {
        let (_, existing) = self.authenticate(session_id).await?;
        if existing.id != account.id {
            return Err(Error::InsufficientPermissions);
        }
        if existing.email != account.email {
            if self.account_id_for_email(&account.email).await?.is_some() {
                return Err(Error::AlreadyExists(format!("account {}", account.email)));
            }
            self.storage.delete(EMAIL_INDEX_KIND, &existing.email).await?;
            self.index_email(&account.email, &account.id).await?;
        }
        self.save(&account).await?;
        Ok(account)
    }

    /// Replaces the auth record and private-key envelope in one step. The
    /// long-term keypair is preserved (see `Account::recover`), so wrapped
    /// data keys pointing at this account stay valid.
    pub async fn recover_account(&self, req: RecoverAccountRequest) -> Result<Account> {
        self.consume_email_token(&req.verify, &req.account.email, EmailPurpose::Recover)
            .await?;

        let existing_id = self
            .account_id_for_email(&req.account.email)
            .await?
            .ok_or_else(|| Error::NotFound(format!("account {}", req.account.email)))?;
        if existing_id != req.account.id || req.auth.account_id != req.account.id {
            return Err(Error::InvalidRequest(
                "recovery payload does not match the stored account".to_string(),
            ));
        }

        // Auth record and envelope replace in one batch; a reader sees
        // either the old pair or the new pair.
        self.storage
            .put_batch(vec![
                Self::record_entry(&req.account)?,
                Self::record_entry(&req.auth)?,
            ])
            .await?;
        info!(account = %req.account.id, "account recovered");
        Ok(req.account)
    }

    pub async fn delete_account(&self, session_id: &str) -> Result<()> {
        let (session, account) = self.authenticate(session_id).await?;
        self.storage.delete(Account::KIND, &account.id).await?;
        self.storage.delete(AuthRecord::KIND, &account.id).await?;
        self.storage.delete(EMAIL_INDEX_KIND, &account.email).await?;
        self.storage.delete(Session::KIND, &session.id).await?;
        info!(account = %account.id, "account deleted");
        Ok(())
    }

    // ── Vaults ──

    /// Creates a personal vault with the caller as sole accessor. The data
    /// key exists only transiently here; it is wrapped to the caller's
    /// public key and dropped.
    pub async fn create_vault(&self, session_id: &str, req: CreateVaultRequest) -> Result<Vault> {
        let (_, account) = self.authenticate(session_id).await?;
        let mut vault = Vault::new(&req.name, None);
        vault.update_accessors(&[&account])?;
        vault.lock();
        self.save(&vault).await?;
        info!(account = %account.id, vault = %vault.id(), "vault created");
        Ok(vault)
    }

    pub async fn get_vault(&self, session_id: &str, vault_id: &str) -> Result<Vault> {
        let (_, account) = self.authenticate(session_id).await?;
        let vault: Vault = self.require(vault_id).await?;
        self.authorize_vault(&vault, &account).await?;
        Ok(vault)
    }

    pub async fn update_vault(&self, session_id: &str, vault: Vault) -> Result<Vault> {
        let (_, account) = self.authenticate(session_id).await?;
        match self.load::<Vault>(vault.id()).await? {
            Some(stored) => self.authorize_vault(&stored, &account).await?,
            // First persistence of a client-created vault. Org vaults are
            // built client-side (only an admin can wrap the org keys), so
            // the create path arrives here.
            None => match &vault.org {
                Some(org_id) => {
                    let org: Org = self.require(org_id).await?;
                    if !org.admin_group.has_accessor(&account.id) {
                        return Err(Error::InsufficientPermissions);
                    }
                }
                None => {
                    if !vault.has_accessor(&account.id) {
                        return Err(Error::InsufficientPermissions);
                    }
                }
            },
        }
        self.save(&vault).await?;
        debug!(vault = %vault.id(), "vault updated");
        Ok(vault)
    }

    pub async fn delete_vault(&self, session_id: &str, vault_id: &str) -> Result<()> {
        let (_, account) = self.authenticate(session_id).await?;
        let vault: Vault = self.require(vault_id).await?;

        match &vault.org {
            // Org vaults are deleted by org admins only.
            Some(org_id) => {
                let mut org: Org = self.require(org_id).await?;
                if !org.admin_group.has_accessor(&account.id) {
                    return Err(Error::InsufficientPermissions);
                }
                org.vaults.retain(|s| s.id != vault_id);
                self.save(&org).await?;
            }
            None => {
                if !vault.has_accessor(&account.id) {
                    return Err(Error::InsufficientPermissions);
                }
            }
        }

        self.storage.delete(Vault::KIND, vault_id).await?;
        info!(vault = %vault_id, "vault deleted");
        Ok(())
    }

    /// Read access: direct accessor, or member of the owning org.
    async fn authorize_vault(&self, vault: &Vault, account: &Account) -> Result<()> {
        if vault.has_accessor(&account.id) {
            return Ok(());
        }
        if let Some(org_id) = &vault.org {
            let org: Org = self.require(org_id).await?;
            if org.members.iter().any(|m| m.id == account.id) {
                return Ok(());
            }
        }
        Err(Error::InsufficientPermissions)
    }

    // ── Orgs ──

    /// Persists a client-initialized org. An org whose payload is not yet
    /// sealed does not exist as far as the server is concerned.
    pub async fn create_org(&self, session_id: &str, org: Org) -> Result<Org> {
        let (_, account) = self.authenticate(session_id).await?;
        if !org.is_initialized() {
            return Err(Error::InvalidRequest(
                "org has not been initialized".to_string(),
            ));
        }
        if !org.members.iter().any(|m| m.id == account.id) {
            return Err(Error::InsufficientPermissions);
        }
        if self.load::<Org>(org.id()).await?.is_some() {
            return Err(Error::AlreadyExists(format!("org {}", org.id())));
        }
        self.save(&org).await?;
        info!(org = %org.id(), founder = %account.id, "org created");
        Ok(org)
    }

    pub async fn get_org(&self, session_id: &str, org_id: &str) -> Result<Org> {
        let (_, account) = self.authenticate(session_id).await?;
        let org: Org = self.require(org_id).await?;
        if !org.members.iter().any(|m| m.id == account.id) {
            return Err(Error::InsufficientPermissions);
        }
        Ok(org)
    }

    pub async fn update_org(&self, session_id: &str, org: Org) -> Result<Org> {
        let (_, account) = self.authenticate(session_id).await?;
        let stored: Org = self.require(org.id()).await?;
        // Only admins (accessors of the stored admin group) may mutate.
        if !stored.admin_group.has_accessor(&account.id) {
            return Err(Error::InsufficientPermissions);
        }
        self.save(&org).await?;
        debug!(org = %org.id(), "org updated");
        Ok(org)
    }

    // ── Invites ──

    /// Fetches an invite. The token is redacted unless the caller is a
    /// member of the issuing org; invitees prove possession of the token
    /// they received out-of-band instead of reading it here.
    pub async fn get_invite(&self, session_id: &str, req: GetInviteRequest) -> Result<Invite> {
        let (_, account) = self.authenticate(session_id).await?;
        let mut invite: Invite = self.require(&req.id).await?;
        if invite.org != req.org {
            return Err(Error::NotFound(format!("invite {}", req.id)));
        }
        let org: Org = self.require(&invite.org).await?;
        if !org.members.iter().any(|m| m.id == account.id) {
            invite.token.clear();
        }
        Ok(invite)
    }

    /// Accepts an invite: the caller proves it holds the token, and the
    /// server enrolls it as a pending org member. The membership becomes
    /// fully trusted once an admin signs the new member's public key.
    pub async fn accept_invite(&self, session_id: &str, req: AcceptInviteRequest) -> Result<()> {
        let (_, account) = self.authenticate(session_id).await?;

        let (mut invite, mut org) = self
            .validate_invite(
                &InviteRef {
                    org: req.org,
                    id: req.id,
                    proof: req.proof,
                },
                &account.email,
            )
            .await?;

        invite.accepted = true;
        org.enroll_pending_member(OrgMember::from_account(&account))?;
        // The spent invite and the enrolled member commit together.
        self.storage
            .put_batch(vec![
                Self::record_entry(&invite)?,
                Self::record_entry(&org)?,
            ])
            .await?;
        info!(org = %org.id(), account = %account.id, "invite accepted");
        Ok(())
    }

    /// Checks an invite end to end without persisting: existence, org
    /// match, expiry, one-shot state, proof, and email binding.
    async fn validate_invite(&self, invite_ref: &InviteRef, email: &str) -> Result<(Invite, Org)> {
        let invite: Invite = self.require(&invite_ref.id).await?;
        if invite.org != invite_ref.org {
            return Err(Error::NotFound(format!("invite {}", invite_ref.id)));
        }
        if invite.accepted || invite.is_expired() {
            return Err(Error::InviteExpired);
        }
        if !invite.matches_proof(&invite_ref.proof) {
            return Err(Error::AuthenticationFailed);
        }
        if invite.email != email {
            return Err(Error::InvalidRequest(
                "invite was issued for a different email".to_string(),
            ));
        }
        let org: Org = self.require(&invite.org).await?;
        Ok((invite, org))
    }

    /// Persists an admin-issued invite so the invitee can later accept it.
    pub async fn put_invite(&self, session_id: &str, invite: Invite) -> Result<Invite> {
        let (_, account) = self.authenticate(session_id).await?;
        let org: Org = self.require(&invite.org).await?;
        if !org.admin_group.has_accessor(&account.id) {
            return Err(Error::InsufficientPermissions);
        }
        self.save(&invite).await?;
        info!(org = %org.id(), invite = %invite.id, "invite published");
        Ok(invite)
    }
}
