#[derive(Debug, Default, serde::Serialize, serde::Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Number of rows, 1 to 500, default 50
    limit: Option<i64>,
}

impl HistoryQuery {
    pub fn limit(&self) -> Option<i64> {
        self.limit
    }
}
