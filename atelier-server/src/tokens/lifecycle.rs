//! Confirmation token issue/resolve lifecycle
//!
//! Tokens are single-use: every resolving action re-reads the token inside
//! a write transaction and re-validates its status immediately before the
//! terminal mutation, so the loser of a concurrent race observes
//! `already_used` rather than silently double-applying. Expiry is enforced
//! logically on every read by comparing `expires_at`.

use crate::db::BackofficeStorage;
use rand::RngCore;
use serde_json::Value;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::token::ConfirmationToken;
use shared::models::{TokenFlavor, TokenStatus};

/// Freshly issued token plus the customer-facing URL
#[derive(Debug, Clone, serde::Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub url: String,
    pub expires_at: i64,
}

/// Customer action against a token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenAction {
    /// Complete the confirmation (order-change: accept the proposed update;
    /// order-cancel: confirm the cancellation)
    Confirm,
    /// Decline on the confirmation page
    Cancel,
    /// Quote flavor: pick an option/metal. Changing an existing selection
    /// requires `confirm`.
    Select {
        option: usize,
        metal: Option<String>,
        confirm: bool,
    },
    /// Quote flavor: complete acceptance of the current selection
    Accept,
}

/// Outcome of a token resolution
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenResolution {
    pub request_id: String,
    pub status: TokenStatus,
    pub snapshot: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_metal: Option<String>,
}

/// Token issue/lookup/resolution over the embedded store
#[derive(Clone)]
pub struct TokenService {
    storage: BackofficeStorage,
    base_url: String,
}

impl TokenService {
    pub fn new(storage: BackofficeStorage, base_url: impl Into<String>) -> Self {
        Self {
            storage,
            base_url: base_url.into(),
        }
    }

    /// 32 random bytes, hex-encoded
    fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn url_for(&self, flavor: TokenFlavor, token: &str) -> String {
        format!(
            "{}{}?token={}",
            self.base_url.trim_end_matches('/'),
            flavor.url_path(),
            token
        )
    }

    /// Issue a fresh token for a request, superseding any live one.
    ///
    /// The superseded token keeps a forward pointer so an old link can
    /// redirect to the refreshed one.
    pub fn issue(
        &self,
        flavor: TokenFlavor,
        request_id: &str,
        snapshot: Value,
        now: i64,
    ) -> AppResult<IssuedToken> {
        let value = Self::generate_token();
        let token = ConfirmationToken::new(&value, flavor, request_id, snapshot, now);

        let txn = self.storage.begin_write()?;
        if let Some(previous_value) = self
            .storage
            .get_indexed_token(flavor, request_id)?
            .filter(|prev| *prev != value)
            && let Some(mut previous) = self.storage.get_token_txn(&txn, flavor, &previous_value)?
        {
            previous.superseded_by = Some(value.clone());
            if previous.status.is_actionable() {
                previous.status = TokenStatus::Expired;
                previous.resolved_at = Some(now);
            }
            self.storage.put_token(&txn, &previous)?;
        }
        self.storage.put_token(&txn, &token)?;
        self.storage
            .put_token_index(&txn, flavor, request_id, &value)?;
        txn.commit().map_err(crate::db::StorageError::from)?;

        tracing::info!(flavor = flavor.prefix(), request_id, "Confirmation token issued");

        Ok(IssuedToken {
            url: self.url_for(flavor, &value),
            token: value,
            expires_at: token.expires_at,
        })
    }

    /// Live cancellation token for an order, created on demand.
    ///
    /// Used when composing reminder emails: the reminder needs a working
    /// cancel link without knowing any token value up front.
    pub fn find_or_create_cancel_token(
        &self,
        request_id: &str,
        snapshot: Value,
        now: i64,
    ) -> AppResult<IssuedToken> {
        if let Some(value) = self
            .storage
            .get_indexed_token(TokenFlavor::OrderCancel, request_id)?
            && let Some(token) = self.storage.get_token(TokenFlavor::OrderCancel, &value)?
            && token.status == TokenStatus::Pending
            && !token.is_expired(now)
        {
            return Ok(IssuedToken {
                url: self.url_for(TokenFlavor::OrderCancel, &value),
                token: value,
                expires_at: token.expires_at,
            });
        }
        self.issue(TokenFlavor::OrderCancel, request_id, snapshot, now)
    }

    /// Read a token without mutating it (confirmation page rendering).
    ///
    /// Lazily expires tokens past their TTL; an expired read reports the
    /// redirect token when a refresh superseded this one.
    pub fn peek(
        &self,
        flavor: TokenFlavor,
        value: &str,
        now: i64,
    ) -> AppResult<TokenResolution> {
        let txn = self.storage.begin_write()?;
        let (_txn, token) = self.load_live(txn, flavor, value, now)?;
        Ok(resolution_of(&token))
    }

    /// Apply a customer action to a token.
    ///
    /// The status check and the terminal mutation happen in one write
    /// transaction; a second actor gets `already_used` with the resulting
    /// status.
    pub fn resolve(
        &self,
        flavor: TokenFlavor,
        value: &str,
        action: TokenAction,
        now: i64,
    ) -> AppResult<TokenResolution> {
        let txn = self.storage.begin_write()?;
        let (txn, mut token) = self.load_live(txn, flavor, value, now)?;

        match action {
            TokenAction::Confirm => {
                if token.status != TokenStatus::Pending {
                    return Err(AppError::already_used(token.status.as_str()));
                }
                token.status = TokenStatus::Confirmed;
                token.resolved_at = Some(now);
            }
            TokenAction::Cancel => {
                if token.status != TokenStatus::Pending {
                    return Err(AppError::already_used(token.status.as_str()));
                }
                token.status = TokenStatus::Canceled;
                token.resolved_at = Some(now);
            }
            TokenAction::Select {
                option,
                metal,
                confirm,
            } => {
                if flavor != TokenFlavor::QuoteAccept {
                    return Err(AppError::invalid_request(
                        "Selection only applies to quote links",
                    ));
                }
                match token.status {
                    TokenStatus::Pending => {
                        token.status = TokenStatus::Selected;
                        token.selected_option = Some(option);
                        token.selected_metal = metal;
                    }
                    TokenStatus::Selected => {
                        let unchanged = token.selected_option == Some(option)
                            && token.selected_metal == metal;
                        if !unchanged && !confirm {
                            let mut err = AppError::new(ErrorCode::ConfirmRequired);
                            if let Some(current) = token.selected_option {
                                err = err.with_detail("selected_option", current as u64);
                            }
                            if let Some(current) = &token.selected_metal {
                                err = err.with_detail("selected_metal", current.clone());
                            }
                            return Err(err);
                        }
                        token.selected_option = Some(option);
                        token.selected_metal = metal;
                    }
                    status => return Err(AppError::already_used(status.as_str())),
                }
            }
            TokenAction::Accept => {
                match token.status {
                    TokenStatus::Selected => {
                        token.status = TokenStatus::Accepted;
                        token.resolved_at = Some(now);
                    }
                    TokenStatus::Pending => {
                        return Err(AppError::invalid_request(
                            "Select an option before accepting",
                        ));
                    }
                    status => return Err(AppError::already_used(status.as_str())),
                }
            }
        }

        self.storage.put_token(&txn, &token)?;
        txn.commit().map_err(crate::db::StorageError::from)?;

        tracing::info!(
            flavor = flavor.prefix(),
            request_id = %token.request_id,
            status = %token.status,
            "Confirmation token resolved"
        );

        Ok(resolution_of(&token))
    }

    /// Load a token inside the transaction, applying lazy expiry.
    ///
    /// Takes the transaction by value: the expiry path must commit its own
    /// write before surfacing the error.
    fn load_live(
        &self,
        txn: redb::WriteTransaction,
        flavor: TokenFlavor,
        value: &str,
        now: i64,
    ) -> AppResult<(redb::WriteTransaction, ConfirmationToken)> {
        let mut token = self
            .storage
            .get_token_txn(&txn, flavor, value)?
            .ok_or_else(|| AppError::not_found("Confirmation link"))?;

        if token.status == TokenStatus::Expired {
            return Err(expired_error(&token));
        }
        if token.is_expired(now) {
            // Store-level TTL may lag; expire on read
            token.status = TokenStatus::Expired;
            self.storage.put_token(&txn, &token)?;
            txn.commit().map_err(crate::db::StorageError::from)?;
            return Err(expired_error(&token));
        }
        Ok((txn, token))
    }
}

fn expired_error(token: &ConfirmationToken) -> AppError {
    let mut err = AppError::expired();
    if let Some(redirect) = &token.superseded_by {
        err = err.with_detail("redirect_token", redirect.clone());
    }
    err
}

fn resolution_of(token: &ConfirmationToken) -> TokenResolution {
    TokenResolution {
        request_id: token.request_id.clone(),
        status: token.status,
        snapshot: token.snapshot.clone(),
        selected_option: token.selected_option,
        selected_metal: token.selected_metal.clone(),
    }
}
