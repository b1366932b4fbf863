//! Transaction request schema for fraud prediction

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A card transaction submitted for fraud scoring.
///
/// Entity identifiers plus the five numeric features the model was trained
/// on. Validated for type and non-negativity before reaching the prediction
/// service.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransactionRequest {
    /// Unique transaction identifier (Feast entity join key)
    pub trans_num: String,

    /// Credit card number
    pub cc_num: String,

    /// Merchant name
    pub merchant: String,

    /// Transaction amount
    #[validate(range(min = 0.0, message = "amt must be non-negative"))]
    pub amt: f64,

    /// Population of the transaction city
    #[validate(range(min = 0, message = "city_pop must be non-negative"))]
    pub city_pop: i64,

    /// Label-encoded transaction category
    pub category_encoded: i64,

    /// Label-encoded gender (0 = F, 1 = M)
    pub gender_encoded: i64,

    /// Label-encoded state
    pub state_encoded: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransactionRequest {
        TransactionRequest {
            trans_num: "txn_12345".to_string(),
            cc_num: "1234567890123456".to_string(),
            merchant: "Amazon".to_string(),
            amt: 49.99,
            city_pop: 50000,
            category_encoded: 8,
            gender_encoded: 1,
            state_encoded: 5,
        }
    }

    #[test]
    fn test_request_roundtrip() {
        let req = sample();
        let json = serde_json::to_string(&req).unwrap();
        let back: TransactionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.trans_num, req.trans_num);
        assert_eq!(back.amt, req.amt);
        assert_eq!(back.state_encoded, req.state_encoded);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut req = sample();
        req.amt = -1.0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_negative_city_pop_rejected() {
        let mut req = sample();
        req.city_pop = -5;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_wrong_type_rejected_at_deserialization() {
        let json = r#"{"trans_num":"t","cc_num":"c","merchant":"m","amt":"lots",
                       "city_pop":1,"category_encoded":1,"gender_encoded":1,"state_encoded":1}"#;
        assert!(serde_json::from_str::<TransactionRequest>(json).is_err());
    }
}
