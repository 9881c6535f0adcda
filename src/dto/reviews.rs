use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub business_id: Uuid,
    pub rating: i16,
    #[serde(default)]
    pub text: String,
    pub latitude: f64,
    pub longitude: f64,
}
