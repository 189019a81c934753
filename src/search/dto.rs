use serde::{Deserialize, Serialize};

use crate::{posts::repo::PostView, users::repo::UserSummary};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub users: Vec<UserSummary>,
    pub posts: Vec<PostView>,
}
