//! The predefined checks for the collide content and comment APIs.
//!
//! The suites assume the target environment is already seeded with the
//! records named in [`Fixtures`]. Nothing here creates or removes content;
//! the comment suite does leave the comments it creates behind.

use http::StatusCode;
use serde_json::json;

use crate::case::TestCase;
use crate::endpoint::{COMMENT_CREATE, COMMENT_LIST, CONTENT_DETAIL};
use crate::errors::CaseError;
use crate::expectation::Expectation;

pub const ROOT_COMMENT_CAPTURE: &str = "root_comment_id";
pub const FIRST_PAGE_CAPTURE: &str = "comments_by_target";

/// Identifiers the suites expect to find in the target environment
#[derive(Debug, Clone, PartialEq)]
pub struct Fixtures {
    pub content_id: i64,
    pub probe_content_ids: Vec<i64>,
    pub missing_content_id: i64,
    pub invalid_content_id: String,
    /// user whose like/favorite/follow state is requested on content detail
    pub interaction_user_id: i64,
    pub user_id: i64,
    pub reply_user_id: i64,
    pub dynamic_user_id: i64,
    pub target_id: i64,
    pub missing_target_id: i64,
    pub reply_parent_id: i64,
    pub keyword: String,
}

impl Default for Fixtures {
    fn default() -> Self {
        Self {
            content_id: 107,
            probe_content_ids: (107..=111).collect(),
            missing_content_id: 999_999,
            invalid_content_id: "abc".to_string(),
            interaction_user_id: 1,
            user_id: 101,
            reply_user_id: 102,
            dynamic_user_id: 103,
            target_id: 101,
            missing_target_id: 99_999,
            reply_parent_id: 101,
            keyword: "精彩".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suite {
    All,
    Content,
    Comments,
}

impl Suite {
    pub fn cases(self, fixtures: &Fixtures) -> Result<Vec<TestCase>, CaseError> {
        match self {
            Suite::All => {
                let mut cases = content_detail(fixtures)?;
                cases.extend(comments(fixtures)?);
                Ok(cases)
            }
            Suite::Content => content_detail(fixtures),
            Suite::Comments => comments(fixtures),
        }
    }

    /// Whether the concurrent list probe belongs to this suite
    pub fn includes_load(self) -> bool {
        matches!(self, Suite::All | Suite::Comments)
    }
}

pub fn content_detail(fixtures: &Fixtures) -> Result<Vec<TestCase>, CaseError> {
    let detail = |name: String, content_id: &dyn ToString| {
        TestCase::builder(name, &CONTENT_DETAIL).path_param("contentId", content_id.to_string())
    };

    let mut cases = vec![
        detail("content detail: existing content".into(), &fixtures.content_id).expect(
            Expectation::all(vec![
                Expectation::success(),
                Expectation::data_field("/id", fixtures.content_id),
            ]),
        )?,
        detail("content detail: with user id".into(), &fixtures.content_id)
            .query("userId", fixtures.interaction_user_id)
            .expect(Expectation::success())?,
        detail("content detail: include offline".into(), &fixtures.content_id)
            .query("includeOffline", true)
            .expect(Expectation::success())?,
        detail(
            "content detail: missing content".into(),
            &fixtures.missing_content_id,
        )
        .expect(Expectation::failure_with_message())?,
        detail(
            "content detail: non-numeric id".into(),
            &fixtures.invalid_content_id,
        )
        .expect(Expectation::status(StatusCode::BAD_REQUEST).advisory())?,
    ];

    for content_id in &fixtures.probe_content_ids {
        cases.push(
            detail(format!("content detail: probe {content_id}"), content_id)
                .expect(Expectation::success())?,
        );
    }

    Ok(cases)
}

pub fn comments(fixtures: &Fixtures) -> Result<Vec<TestCase>, CaseError> {
    let list = |name: &str| TestCase::builder(name, &COMMENT_LIST);
    let create = |name: &str| TestCase::builder(name, &COMMENT_CREATE);

    Ok(vec![
        list("comments: list all").expect(Expectation::success())?,
        list("comments: by target")
            .query("targetId", fixtures.target_id)
            .query("commentType", "CONTENT")
            .query("currentPage", 1)
            .query("pageSize", 10)
            .capture(FIRST_PAGE_CAPTURE, "/data")
            .expect(Expectation::success())?,
        list("comments: by target again")
            .query("targetId", fixtures.target_id)
            .query("commentType", "CONTENT")
            .query("currentPage", 1)
            .query("pageSize", 10)
            .expect(Expectation::same_data(FIRST_PAGE_CAPTURE))?,
        list("comments: by user")
            .query("userId", fixtures.user_id)
            .query("currentPage", 1)
            .query("pageSize", 5)
            .expect(Expectation::success())?,
        list("comments: root comments")
            .query("parentId", 0)
            .query("currentPage", 1)
            .query("pageSize", 10)
            .expect(Expectation::success())?,
        list("comments: replies")
            .query("parentId", fixtures.reply_parent_id)
            .query("currentPage", 1)
            .query("pageSize", 10)
            .expect(Expectation::success())?,
        list("comments: keyword search")
            .query("keyword", &fixtures.keyword)
            .query("currentPage", 1)
            .query("pageSize", 10)
            .expect(Expectation::success())?,
        create("comments: create root comment")
            .body(json!({
                "commentType": "CONTENT",
                "targetId": fixtures.target_id,
                "parentCommentId": 0,
                "content": "Root comment created by collide-check",
                "userId": fixtures.user_id,
                "userNickname": "collide-check user 1",
                "userAvatar": "https://example.com/avatar1.jpg",
                "status": "NORMAL"
            }))
            .capture(ROOT_COMMENT_CAPTURE, "/data/id")
            .expect(Expectation::success())?,
        create("comments: reply to new comment")
            .body(json!({
                "commentType": "CONTENT",
                "targetId": fixtures.target_id,
                "parentCommentId": format!("{{{{{ROOT_COMMENT_CAPTURE}}}}}"),
                "content": "Reply created by collide-check",
                "userId": fixtures.reply_user_id,
                "userNickname": "collide-check user 2",
                "userAvatar": "https://example.com/avatar2.jpg",
                "replyToUserId": fixtures.user_id,
                "replyToUserNickname": "collide-check user 1",
                "replyToUserAvatar": "https://example.com/avatar1.jpg",
                "status": "NORMAL"
            }))
            .expect(Expectation::success())?,
        create("comments: create dynamic comment")
            .body(json!({
                "commentType": "DYNAMIC",
                "targetId": fixtures.target_id,
                "parentCommentId": 0,
                "content": "Dynamic comment created by collide-check",
                "userId": fixtures.dynamic_user_id,
                "userNickname": "collide-check user 3",
                "userAvatar": "https://example.com/avatar3.jpg",
                "status": "NORMAL"
            }))
            .expect(Expectation::success())?,
        create("comments: missing user id")
            .body(json!({
                "commentType": "CONTENT",
                "targetId": fixtures.target_id,
                "content": "Comment without an author"
            }))
            .expect(Expectation::rejected())?,
        create("comments: invalid comment type")
            .body(json!({
                "commentType": "INVALID_TYPE",
                "targetId": fixtures.target_id,
                "parentCommentId": 0,
                "content": "Comment with an unknown type",
                "userId": fixtures.user_id,
                "userNickname": "collide-check user 1",
                "userAvatar": "https://example.com/avatar1.jpg"
            }))
            .expect(Expectation::rejected())?,
        create("comments: missing target")
            .body(json!({
                "commentType": "CONTENT",
                "targetId": fixtures.missing_target_id,
                "parentCommentId": 0,
                "content": "Comment on a target that does not exist",
                "userId": fixtures.user_id,
                "userNickname": "collide-check user 1",
                "userAvatar": "https://example.com/avatar1.jpg"
            }))
            .expect(Expectation::rejected())?,
        create("comments: empty content")
            .body(json!({
                "commentType": "CONTENT",
                "targetId": fixtures.target_id,
                "parentCommentId": 0,
                "content": "",
                "userId": fixtures.user_id,
                "userNickname": "collide-check user 1",
                "userAvatar": "https://example.com/avatar1.jpg"
            }))
            .expect(Expectation::rejected())?,
    ])
}

/// Request fired concurrently by the load probe
pub fn load_target(_fixtures: &Fixtures) -> Result<TestCase, CaseError> {
    TestCase::builder("comments: list all", &COMMENT_LIST).expect(Expectation::success())
}
