use std::collections::HashSet;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::jwt::MaybeAuthUser,
    error::ApiError,
    posts::{self, repo::PostView},
    search::dto::{SearchParams, SearchResponse},
    state::AppState,
    users,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/search", get(search))
}

/// Case-insensitive substring search across users and posts. The post list
/// also picks up every post written by a matched user, deduplicated against
/// the direct matches.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let term = params.q.trim();
    if term.is_empty() {
        return Ok(Json(SearchResponse {
            users: Vec::new(),
            posts: Vec::new(),
        }));
    }

    let pattern = like_pattern(term);
    let users = users::repo::search(&state.db, &pattern).await?;
    let direct = posts::repo::search_matching(&state.db, viewer, &pattern).await?;
    let by_author = posts::repo::search_by_author(&state.db, viewer, &pattern).await?;

    Ok(Json(SearchResponse {
        users,
        posts: merge(direct, by_author),
    }))
}

/// Wraps the term in `%` wildcards, escaping the LIKE metacharacters so
/// the term itself always matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("%{escaped}%")
}

/// Combines direct matches with author matches, keeping one copy per post
/// id. The combined list is sorted once at the end: author-matched extras
/// would otherwise trail the direct matches out of recency order.
fn merge(direct: Vec<PostView>, by_author: Vec<PostView>) -> Vec<PostView> {
    let mut seen = HashSet::new();
    let mut merged: Vec<PostView> = direct
        .into_iter()
        .chain(by_author)
        .filter(|post| seen.insert(post.id))
        .collect();
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posts::repo::PostCategory;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn post(id: Uuid, minutes: i64) -> PostView {
        PostView {
            id,
            author_id: Uuid::new_v4(),
            author_username: "author".into(),
            author_profile_pic: None,
            title: "title".into(),
            content: "content".into(),
            category: PostCategory::Technology,
            image: None,
            video: None,
            created_at: OffsetDateTime::from_unix_timestamp(1_700_000_000 + minutes * 60)
                .unwrap(),
            like_count: 0,
            comment_count: 0,
            liked: false,
        }
    }

    #[test]
    fn like_pattern_wraps_in_wildcards() {
        assert_eq!(like_pattern("abc"), "%abc%");
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern(r"back\slash"), "%back\\\\slash%");
    }

    #[test]
    fn merge_drops_duplicate_ids() {
        let shared = Uuid::new_v4();
        let merged = merge(
            vec![post(shared, 0), post(Uuid::new_v4(), 1)],
            vec![post(shared, 0), post(Uuid::new_v4(), 2)],
        );
        assert_eq!(merged.len(), 3);
        assert_eq!(
            merged.iter().filter(|p| p.id == shared).count(),
            1,
            "a post matching both directly and via its author appears once"
        );
    }

    #[test]
    fn merge_sorts_once_after_combining() {
        // Author-matched posts may be newer than every direct match; a bare
        // concatenation would leave them stranded at the tail.
        let newest = post(Uuid::new_v4(), 30);
        let middle = post(Uuid::new_v4(), 20);
        let oldest = post(Uuid::new_v4(), 10);
        let merged = merge(
            vec![middle.clone(), oldest.clone()],
            vec![newest.clone()],
        );
        let order: Vec<_> = merged.iter().map(|p| p.id).collect();
        assert_eq!(order, vec![newest.id, middle.id, oldest.id]);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        assert!(merge(Vec::new(), Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn whitespace_term_answers_empty_before_any_query() {
        // The fake state's pool points nowhere, so this only passes if the
        // short-circuit answers without touching the store.
        let Json(response) = search(
            State(AppState::fake()),
            MaybeAuthUser(None),
            Query(SearchParams {
                q: "   \t ".into(),
            }),
        )
        .await
        .unwrap();

        assert!(response.users.is_empty());
        assert!(response.posts.is_empty());
    }
}
