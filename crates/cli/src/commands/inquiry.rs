//! Inquiry commands.

use machinery_store_client::Resolution;
use machinery_store_client::inquiry::{InquiryBoard, InquiryDraft};
use machinery_store_core::InquiryId;

use super::{CliError, Session};

pub async fn submit(session: &Session, draft: &InquiryDraft) -> Result<(), CliError> {
    session.client().submit_inquiry(draft).await?;
    println!("Inquiry sent. We will get back to you soon.");
    Ok(())
}

/// Print every inquiry, pending first.
pub async fn list(session: &Session) -> Result<(), CliError> {
    session.guard.require_admin()?;
    let board = InquiryBoard::new(session.client().list_inquiries().await?);

    for inquiry in board.iter() {
        let status = if inquiry.resolved { "resolved" } else { "pending" };
        let product = inquiry
            .product_id
            .map(|id| format!(" (product {id})"))
            .unwrap_or_default();
        println!(
            "#{:<5} [{status:<8}] {} <{}> {}{product}",
            inquiry.id, inquiry.name, inquiry.email, inquiry.phone
        );
        println!("        {}", inquiry.message);
    }

    println!(
        "{} inquiries: {} pending, {} resolved",
        board.total(),
        board.pending_count(),
        board.resolved_count()
    );
    Ok(())
}

pub async fn resolve(session: &Session, id: InquiryId) -> Result<(), CliError> {
    session.guard.require_admin()?;
    match session.client().resolve_inquiry(id).await? {
        Resolution::Resolved => println!("Inquiry #{id} marked resolved"),
        Resolution::AlreadyResolved => println!("Inquiry #{id} was already resolved"),
    }
    Ok(())
}
