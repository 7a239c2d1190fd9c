//! Inquiry workflow.
//!
//! Visitors submit drafts; admins see the full list split into pending and
//! resolved. Resolution only ever moves an inquiry from pending to resolved.

use machinery_store_core::{Email, Inquiry, InquiryInput, ProductId};

use crate::error::ValidationError;

/// Unvalidated inquiry form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InquiryDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    pub product_id: Option<ProductId>,
}

impl InquiryDraft {
    /// Check required fields and normalize the draft for submission.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a blank name or message, or an
    /// email that does not parse.
    pub fn validate(&self) -> Result<InquiryInput, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let email = Email::parse(&self.email)?;
        let message = self.message.trim();
        if message.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }

        Ok(InquiryInput {
            name: name.to_string(),
            email,
            phone: self.phone.trim().to_string(),
            message: message.to_string(),
            product_id: self.product_id,
        })
    }
}

/// Inquiries ordered for the admin view: pending first, then resolved.
///
/// Recomputed from the cached list on demand; never cached itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InquiryBoard {
    pending: Vec<Inquiry>,
    resolved: Vec<Inquiry>,
}

impl InquiryBoard {
    /// Partition `inquiries`, keeping their relative order within each group.
    #[must_use]
    pub fn new(inquiries: Vec<Inquiry>) -> Self {
        let (resolved, pending) = inquiries.into_iter().partition(|i| i.resolved);
        Self { pending, resolved }
    }

    #[must_use]
    pub fn pending(&self) -> &[Inquiry] {
        &self.pending
    }

    #[must_use]
    pub fn resolved(&self) -> &[Inquiry] {
        &self.resolved
    }

    /// Every inquiry, pending first.
    pub fn iter(&self) -> impl Iterator<Item = &Inquiry> {
        self.pending.iter().chain(&self.resolved)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.pending.len() + self.resolved.len()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }
}
