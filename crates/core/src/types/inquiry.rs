//! Purchase inquiries.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::{InquiryId, ProductId};

/// An inquiry as stored by the remote service.
///
/// `resolved` only ever moves from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inquiry {
    pub id: InquiryId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    pub resolved: bool,
}

/// Validated fields sent with `submitInquiry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryInput {
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_inquiry_without_product_omits_field() {
        let input = InquiryInput {
            name: "Asha".into(),
            email: Email::parse("asha@farm.in").unwrap(),
            phone: String::new(),
            message: "Price for 10 units?".into(),
            product_id: None,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert!(json.get("productId").is_none());
        assert_eq!(json["email"], "asha@farm.in");
    }

    #[test]
    fn test_inquiry_decodes_missing_product() {
        let inquiry: Inquiry = serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Asha",
            "email": "asha@farm.in",
            "phone": "",
            "message": "hello",
            "resolved": false
        }))
        .unwrap();
        assert_eq!(inquiry.product_id, None);
    }
}
