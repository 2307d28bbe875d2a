use serde::{Deserialize, Serialize};

/// Promotions API coupon state (partial, only fields we need)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CouponInfo {
    pub code: Option<String>,
    pub status: Option<String>, // e.g., "new", "available", "claimed", "redeemed"
    pub is_used: Option<bool>,
    pub expires_at: Option<String>,
    pub promotion: Option<PromotionInfo>,
    pub commerce: Option<CommerceInfo>,
}

/// Promotion descriptor (partial, only fields we need)
#[derive(Debug, Clone, Deserialize)]
pub struct PromotionInfo {
    pub title: Option<String>,
}

/// Commerce descriptor (partial, only fields we need)
#[derive(Debug, Clone, Deserialize)]
pub struct CommerceInfo {
    pub name: Option<String>,
}

/// Body for the claim call
#[derive(Debug, Clone, Serialize)]
pub struct ClaimBody {
    pub device: String,
}

/// Body for the redeem call
#[derive(Debug, Clone, Serialize)]
pub struct RedeemBody {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dni: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,
}
