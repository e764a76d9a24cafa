//! Syntactic validation of raw submissions.
//!
//! Turns a [`RawTransaction`] into a [`SignedTransaction`] or reports the
//! first problem found. Checks, in order:
//! - kind is recognised
//! - every field the kind needs is present
//! - sender is a well-formed, non-zero account
//! - recipient parses as an account (transfer) or validator id
//! - amount is a decimal integer, strictly positive for transfer and delegate
//! - transfer does not target the sender
//! - signature is 65 bytes of hex
//!
//! Nothing here touches ledger state or verifies the signature against a key.

use l2core_types::{
    AccountId, Amount, RawTransaction, Signature, SignedTransaction, Transaction, TxKind,
    TxPayload, ValidatorId,
};
use tracing::trace;

use crate::{IntakeError, Result};

/// Validate a raw submission and build its typed form.
pub fn parse_raw(raw: &RawTransaction) -> Result<SignedTransaction> {
    let kind_str = raw.kind.as_deref().ok_or(IntakeError::MissingField("kind"))?;
    let kind: TxKind = kind_str
        .parse()
        .map_err(|_| IntakeError::UnknownKind(kind_str.to_string()))?;

    let sender_str = raw
        .sender
        .as_deref()
        .ok_or(IntakeError::MissingField("sender"))?;
    let recipient_str = raw
        .recipient
        .as_deref()
        .ok_or(IntakeError::MissingField("recipient"))?;
    let amount_str = raw
        .amount
        .as_deref()
        .ok_or(IntakeError::MissingField("amount"))?;
    let timestamp = raw.timestamp.ok_or(IntakeError::MissingField("timestamp"))?;
    let signature_str = raw
        .signature
        .as_deref()
        .ok_or(IntakeError::MissingField("signature"))?;

    let sender = parse_sender(sender_str)?;
    let amount = parse_amount(amount_str, kind)?;

    let payload = match kind {
        TxKind::Transfer => {
            let to: AccountId = recipient_str
                .parse()
                .map_err(|e| IntakeError::InvalidRecipient(format!("{recipient_str}: {e}")))?;
            if to.is_zero() {
                return Err(IntakeError::InvalidRecipient(
                    "zero account cannot receive".into(),
                ));
            }
            if to == sender {
                return Err(IntakeError::SelfTransfer);
            }
            TxPayload::Transfer { to, amount }
        }
        TxKind::Delegate => TxPayload::Delegate {
            validator: parse_validator(recipient_str)?,
            amount,
        },
        TxKind::RegisterValidator => TxPayload::RegisterValidator {
            validator: parse_validator(recipient_str)?,
            self_stake: amount,
        },
    };

    let signature = Signature::from_hex(signature_str)
        .map_err(|e| IntakeError::InvalidSignature(e.to_string()))?;

    let tx = SignedTransaction::new(Transaction::new(sender, payload, timestamp), signature);
    trace!(tx_hash = %tx.hash(), kind = %kind, "raw transaction accepted");
    Ok(tx)
}

/// Re-check a typed transaction against the same rules.
pub fn check_signed(tx: &SignedTransaction) -> Result<()> {
    if tx.sender().is_zero() {
        return Err(IntakeError::InvalidSender("zero account".into()));
    }
    match tx.payload() {
        TxPayload::Transfer { to, amount } => {
            if *amount == 0 {
                return Err(IntakeError::InvalidAmount("must be positive".into()));
            }
            if to.is_zero() {
                return Err(IntakeError::InvalidRecipient(
                    "zero account cannot receive".into(),
                ));
            }
            if *to == tx.sender() {
                return Err(IntakeError::SelfTransfer);
            }
        }
        TxPayload::Delegate { amount, .. } => {
            if *amount == 0 {
                return Err(IntakeError::InvalidAmount("must be positive".into()));
            }
        }
        TxPayload::RegisterValidator { .. } => {}
    }
    Ok(())
}

fn parse_sender(s: &str) -> Result<AccountId> {
    let sender: AccountId = s
        .parse()
        .map_err(|e| IntakeError::InvalidSender(format!("{s}: {e}")))?;
    if sender.is_zero() {
        return Err(IntakeError::InvalidSender("zero account".into()));
    }
    Ok(sender)
}

fn parse_validator(s: &str) -> Result<ValidatorId> {
    ValidatorId::new(s).map_err(|e| IntakeError::InvalidRecipient(e.to_string()))
}

fn parse_amount(s: &str, kind: TxKind) -> Result<Amount> {
    let amount: Amount = s
        .trim()
        .parse()
        .map_err(|_| IntakeError::InvalidAmount(format!("not a non-negative integer: {s:?}")))?;
    if amount == 0 && kind != TxKind::RegisterValidator {
        return Err(IntakeError::InvalidAmount("must be positive".into()));
    }
    Ok(amount)
}
