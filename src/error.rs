use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    models::RejectionReason,
    response::{ApiResponse, Meta},
    rewards::{
        IssueError, PromotionError, QrError, RedemptionError, ReviewError, TemplateError,
    },
    store::StoreError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Invalid review: {0}")]
    InvalidReview(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("You must be at the business to review it")]
    OutOfGeofence,

    #[error("You already reviewed this business recently")]
    DuplicateReview,

    #[error("Business has no active coupon template")]
    TemplateInactive,

    #[error("Invalid QR payload")]
    InvalidQrPayload,

    #[error("Coupon belongs to another business")]
    WrongBusiness,

    #[error("Coupon already redeemed")]
    AlreadyRedeemed,

    #[error("Coupon expired")]
    Expired,

    #[error("Coupon usage limit reached")]
    UsageLimitReached,

    #[error("Coupon is inactive")]
    CouponInactive,

    #[error("Redemption could not be confirmed, check the coupon status")]
    RedemptionUnavailable,

    #[error("Storage error")]
    Store(#[source] StoreError),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorData {
    pub error: String,
    pub code: &'static str,
}

impl AppError {
    /// Stable machine-readable kind carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::InvalidReview(_) => "invalid_review",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::OutOfGeofence => "out_of_geofence",
            AppError::DuplicateReview => "duplicate_review",
            AppError::TemplateInactive => "template_inactive",
            AppError::InvalidQrPayload => "invalid_qr_payload",
            AppError::WrongBusiness => "wrong_business",
            AppError::AlreadyRedeemed => "already_redeemed",
            AppError::Expired => "expired",
            AppError::UsageLimitReached => "usage_limit_reached",
            AppError::CouponInactive => "coupon_inactive",
            AppError::RedemptionUnavailable => "redemption_unavailable",
            AppError::Store(_) | AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::InvalidReview(_) | AppError::InvalidQrPayload => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::OutOfGeofence | AppError::WrongBusiness => {
                StatusCode::FORBIDDEN
            }
            AppError::Conflict(_)
            | AppError::DuplicateReview
            | AppError::TemplateInactive
            | AppError::AlreadyRedeemed
            | AppError::UsageLimitReached
            | AppError::CouponInactive => StatusCode::CONFLICT,
            AppError::Expired => StatusCode::GONE,
            AppError::RedemptionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Store(_) | AppError::Internal(_) => {
                tracing::error!(error = ?self, "unexpected failure");
                "Internal Server Error".to_string()
            }
            _ => self.to_string(),
        };

        let body = ApiResponse {
            message: message.clone(),
            data: Some(ErrorData {
                error: message,
                code: self.code(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AppError::Conflict("record already exists".into()),
            other => AppError::Store(other),
        }
    }
}

impl From<RejectionReason> for AppError {
    fn from(reason: RejectionReason) -> Self {
        match reason {
            RejectionReason::NotFound => AppError::NotFound("Coupon"),
            RejectionReason::WrongBusiness => AppError::WrongBusiness,
            RejectionReason::AlreadyRedeemed => AppError::AlreadyRedeemed,
            RejectionReason::Expired => AppError::Expired,
            RejectionReason::UsageLimitReached => AppError::UsageLimitReached,
            RejectionReason::Inactive => AppError::CouponInactive,
        }
    }
}

impl From<RedemptionError> for AppError {
    fn from(err: RedemptionError) -> Self {
        match err {
            RedemptionError::Rejected(reason) => reason.into(),
            RedemptionError::Unavailable => AppError::RedemptionUnavailable,
        }
    }
}

impl From<QrError> for AppError {
    fn from(err: QrError) -> Self {
        match err {
            QrError::InvalidPayload => AppError::InvalidQrPayload,
            QrError::Encode(source) => AppError::Internal(source.into()),
        }
    }
}

impl From<IssueError> for AppError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::TemplateInactive => AppError::TemplateInactive,
            IssueError::Store(store) => store.into(),
            exhausted @ IssueError::CodeSpaceExhausted { .. } => {
                AppError::Internal(exhausted.into())
            }
        }
    }
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::InvalidReview(reason) => AppError::InvalidReview(reason),
            ReviewError::BusinessNotFound => AppError::NotFound("Business"),
            ReviewError::OutOfGeofence => AppError::OutOfGeofence,
            ReviewError::DuplicateReview => AppError::DuplicateReview,
            ReviewError::ReviewNotFound => AppError::NotFound("Review"),
            ReviewError::NoActiveTemplate => AppError::TemplateInactive,
            ReviewError::Issue(issue) => issue.into(),
            ReviewError::Store(store) => store.into(),
        }
    }
}

impl From<TemplateError> for AppError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::InvalidTerms(terms) => AppError::BadRequest(terms.to_string()),
            TemplateError::Store(store) => store.into(),
        }
    }
}

impl From<PromotionError> for AppError {
    fn from(err: PromotionError) -> Self {
        match err {
            PromotionError::Invalid(reason) => AppError::BadRequest(reason),
            PromotionError::InvalidTerms(terms) => AppError::BadRequest(terms.to_string()),
            PromotionError::CodeTaken => AppError::Conflict("coupon code already in use".into()),
            PromotionError::NotFound => AppError::NotFound("Promotional coupon"),
            PromotionError::Store(store) => store.into(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[tokio::test]
    async fn unexpected_failures_are_opaque() {
        let response =
            AppError::Store(StoreError::Corrupt("terms column is not json".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Internal Server Error");
        assert_eq!(body["data"]["code"], "internal");
        assert!(!String::from_utf8_lossy(&bytes).contains("terms column"));
    }

    #[test]
    fn redemption_rejections_map_to_distinct_statuses() {
        let cases = [
            (RejectionReason::NotFound, StatusCode::NOT_FOUND, "not_found"),
            (RejectionReason::WrongBusiness, StatusCode::FORBIDDEN, "wrong_business"),
            (RejectionReason::AlreadyRedeemed, StatusCode::CONFLICT, "already_redeemed"),
            (RejectionReason::Expired, StatusCode::GONE, "expired"),
            (RejectionReason::UsageLimitReached, StatusCode::CONFLICT, "usage_limit_reached"),
            (RejectionReason::Inactive, StatusCode::CONFLICT, "coupon_inactive"),
        ];
        for (reason, status, code) in cases {
            let err = AppError::from(RedemptionError::Rejected(reason));
            assert_eq!(err.status(), status, "{reason:?}");
            assert_eq!(err.code(), code, "{reason:?}");
        }

        let unavailable = AppError::from(RedemptionError::Unavailable);
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.code(), "redemption_unavailable");
    }

    #[test]
    fn review_and_qr_errors_keep_their_codes() {
        let cases = [
            (AppError::from(ReviewError::OutOfGeofence), StatusCode::FORBIDDEN, "out_of_geofence"),
            (AppError::from(ReviewError::DuplicateReview), StatusCode::CONFLICT, "duplicate_review"),
            (
                AppError::from(ReviewError::InvalidReview("rating".into())),
                StatusCode::BAD_REQUEST,
                "invalid_review",
            ),
            (AppError::from(QrError::InvalidPayload), StatusCode::BAD_REQUEST, "invalid_qr_payload"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status(), status, "{code}");
            assert_eq!(err.code(), code);
        }
    }
}
