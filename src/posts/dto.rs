use serde::{Deserialize, Serialize};

use crate::posts::repo::{CommentView, PostView};

#[derive(Debug, Deserialize)]
pub struct ListPostsParams {
    pub category: Option<String>,
}

/// Post detail page payload: the post plus its comments.
#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    #[serde(flatten)]
    pub post: PostView,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

/// Fields collected from the `multipart/form-data` body of a post
/// submission, before validation.
#[derive(Debug, Default)]
pub struct CreatePostForm {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub image: Option<crate::storage::FileUpload>,
    pub video: Option<crate::storage::FileUpload>,
}
