//! Payment request workflow.
//!
//! The user-supplied token is both the primary key and the idempotency key of
//! a request. Approval credits the wallet through
//! [`WalletLedger::credit_once`] keyed by the token, while the
//! payment_requests gate is held. If the status flip fails to save after the
//! credit went through, approving again finds the existing credit and only
//! repairs the status.

use crate::metrics;
use crate::wallet::{LedgerEntry, WalletLedger};
use arena_core::environment::Clock;
use arena_core::ids::{PaymentToken, UserId};
use arena_core::payment::{PaymentRequest, PaymentStatus, Transition};
use arena_core::wallet::{Currency, TransactionType};
use arena_core::{Decimal, LedgerError};
use arena_runtime::{MutationSerializer, Outcome, run_to_completion};
use std::sync::Arc;

/// Submission, approval and decline of credit top-ups.
#[derive(Clone)]
pub struct PaymentWorkflow {
    serializer: MutationSerializer,
    wallet: WalletLedger,
    clock: Arc<dyn Clock>,
}

impl PaymentWorkflow {
    /// Create the workflow. `wallet` must share `serializer`'s gates.
    #[must_use]
    pub fn new(serializer: MutationSerializer, wallet: WalletLedger, clock: Arc<dyn Clock>) -> Self {
        Self {
            serializer,
            wallet,
            clock,
        }
    }

    /// Submit a pending request.
    ///
    /// # Errors
    ///
    /// `Validation` for a non-positive amount, `NotFound` for an unknown
    /// user, `DuplicateToken` if any request already uses `token`.
    pub async fn create(
        &self,
        user_id: UserId,
        amount: Decimal,
        token: PaymentToken,
    ) -> Result<PaymentRequest, LedgerError> {
        let request = PaymentRequest::new(token, user_id, amount, self.clock.now())?;
        self.wallet.get_user(&request.user_id).await?;

        let created = self
            .serializer
            .with_collection::<PaymentRequest, _, _>(move |requests| {
                if requests.iter().any(|r| r.id == request.id) {
                    tracing::debug!(token = %request.id, "Duplicate payment token");
                    return Err(LedgerError::DuplicateToken(request.id));
                }
                requests.push(request.clone());
                Ok(Outcome::Changed(request))
            })
            .await?;

        metrics::record_payment_request(PaymentStatus::Pending.as_str());
        tracing::info!(
            token = %created.id,
            user_id = %created.user_id,
            amount = %created.amount,
            "Payment request submitted"
        );
        Ok(created)
    }

    /// Approve a request and credit the user.
    ///
    /// Approving an approved request returns it unchanged.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown token, `AlreadyDeclined` for a declined
    /// request, store errors otherwise.
    pub async fn approve(&self, token: &PaymentToken) -> Result<PaymentRequest, LedgerError> {
        let mut requests = self.serializer.lease::<PaymentRequest>().await?;
        let wallet = self.wallet.clone();
        let clock = Arc::clone(&self.clock);
        let token = token.clone();

        run_to_completion(async move {
            let request = requests
                .find(token.as_str())
                .ok_or_else(|| LedgerError::not_found("payment request", &token))?;
            if request.approval()? == Transition::AlreadyDone {
                return Ok(request.clone());
            }

            let credit = wallet.credit_once(purchase_entry(request)).await?;
            if !credit.is_applied() {
                tracing::info!(%token, "Credit already posted; repairing request status");
            }

            let request = requests
                .find_mut(token.as_str())
                .ok_or_else(|| LedgerError::not_found("payment request", &token))?;
            request.resolve(PaymentStatus::Approved, clock.now());
            let approved = request.clone();
            requests.commit().await?;

            metrics::record_payment_request(PaymentStatus::Approved.as_str());
            tracing::info!(
                %token,
                user_id = %approved.user_id,
                transaction_id = %credit.transaction().id,
                "Payment request approved"
            );
            Ok(approved)
        })
        .await
    }

    /// Decline a request. No wallet effect.
    ///
    /// Declining a declined request returns it unchanged. A pending request
    /// whose credit was already posted by an interrupted approval is marked
    /// approved instead.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown token, `AlreadyApproved` for an approved
    /// request or one whose credit was already posted.
    pub async fn decline(&self, token: &PaymentToken) -> Result<PaymentRequest, LedgerError> {
        let mut requests = self.serializer.lease::<PaymentRequest>().await?;
        let wallet = self.wallet.clone();
        let clock = Arc::clone(&self.clock);
        let token = token.clone();

        run_to_completion(async move {
            let request = requests
                .find(token.as_str())
                .ok_or_else(|| LedgerError::not_found("payment request", &token))?;
            if request.decline()? == Transition::AlreadyDone {
                return Ok(request.clone());
            }

            let posted = wallet.find_credit(&purchase_entry(request)).await?;
            let status = if posted.is_some() {
                PaymentStatus::Approved
            } else {
                PaymentStatus::Declined
            };

            let request = requests
                .find_mut(token.as_str())
                .ok_or_else(|| LedgerError::not_found("payment request", &token))?;
            request.resolve(status, clock.now());
            let resolved = request.clone();
            requests.commit().await?;
            metrics::record_payment_request(status.as_str());

            if let Some(credit) = posted {
                tracing::warn!(
                    %token,
                    transaction_id = %credit.id,
                    "Decline refused; credit already posted, request marked approved"
                );
                return Err(LedgerError::AlreadyApproved(token));
            }
            tracing::info!(%token, user_id = %resolved.user_id, "Payment request declined");
            Ok(resolved)
        })
        .await
    }

    /// Read one request.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown token.
    pub async fn get(&self, token: &PaymentToken) -> Result<PaymentRequest, LedgerError> {
        self.serializer
            .snapshot::<PaymentRequest>()
            .await?
            .into_iter()
            .find(|r| &r.id == token)
            .ok_or_else(|| LedgerError::not_found("payment request", token))
    }

    /// Requests, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub async fn list(
        &self,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRequest>, LedgerError> {
        let mut requests: Vec<PaymentRequest> = self
            .serializer
            .snapshot::<PaymentRequest>()
            .await?
            .into_iter()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .collect();
        requests.sort_by(|a, b| b.requested_date.cmp(&a.requested_date));
        Ok(requests)
    }
}

/// The credit posted when `request` is approved, keyed by its token.
fn purchase_entry(request: &PaymentRequest) -> LedgerEntry {
    LedgerEntry::new(
        request.user_id.clone(),
        Currency::Credits,
        request.amount,
        TransactionType::CreditPurchase,
        format!("Credit purchase {}", request.id),
    )
    .related_to(&request.id)
}

impl std::fmt::Debug for PaymentWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentWorkflow").finish_non_exhaustive()
    }
}
