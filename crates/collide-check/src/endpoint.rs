use http::Method;
use serde_json::{Map, Value};

/// A field of an endpoint's JSON request body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyField {
    pub name: &'static str,
    pub required: bool,
}

impl BodyField {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

/// Static description of one collaborator route.
///
/// `path` is a template whose `{name}` segments are filled from a test case's
/// path parameters. `query` and `body` list every key the route accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: &'static str,
    pub method: Method,
    pub path: &'static str,
    pub query: &'static [&'static str],
    pub body: &'static [BodyField],
}

pub static CONTENT_DETAIL: Endpoint = Endpoint {
    name: "content detail",
    method: Method::GET,
    path: "/api/v1/content/core/{contentId}",
    query: &["userId", "includeOffline"],
    body: &[],
};

pub static COMMENT_LIST: Endpoint = Endpoint {
    name: "comment list",
    method: Method::GET,
    path: "/api/v1/comments/list",
    query: &[
        "commentType",
        "targetId",
        "userId",
        "parentId",
        "status",
        "keyword",
        "orderBy",
        "orderDirection",
        "currentPage",
        "pageSize",
    ],
    body: &[],
};

pub static COMMENT_CREATE: Endpoint = Endpoint {
    name: "comment create",
    method: Method::POST,
    path: "/api/v1/comments/create",
    query: &[],
    body: &[
        BodyField::required("commentType"),
        BodyField::required("targetId"),
        BodyField::optional("parentCommentId"),
        BodyField::required("content"),
        BodyField::required("userId"),
        BodyField::optional("userNickname"),
        BodyField::optional("userAvatar"),
        BodyField::optional("replyToUserId"),
        BodyField::optional("replyToUserNickname"),
        BodyField::optional("replyToUserAvatar"),
        BodyField::optional("status"),
    ],
};

impl Endpoint {
    /// Placeholder names in template order
    pub fn placeholders(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.path
            .split('/')
            .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
    }

    pub fn has_placeholder(&self, name: &str) -> bool {
        self.placeholders().any(|p| p == name)
    }

    pub fn accepts_query(&self, key: &str) -> bool {
        self.query.contains(&key)
    }

    pub fn accepts_body(&self) -> bool {
        !self.body.is_empty()
    }

    pub fn accepts_field(&self, name: &str) -> bool {
        self.body.iter().any(|field| field.name == name)
    }

    /// Required body fields absent from `body`
    pub fn missing_required(&self, body: &Map<String, Value>) -> Vec<&'static str> {
        self.body
            .iter()
            .filter(|field| field.required && !body.contains_key(field.name))
            .map(|field| field.name)
            .collect()
    }

    /// Fill the path template. Returns the first placeholder `lookup` cannot bind.
    pub fn render_path<'a, F>(&self, mut lookup: F) -> Result<String, &'static str>
    where
        F: FnMut(&str) -> Option<&'a str>,
    {
        let mut rendered = String::with_capacity(self.path.len());
        for segment in self.path.split('/').skip(1) {
            rendered.push('/');
            match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => rendered.push_str(lookup(name).ok_or(name)?),
                None => rendered.push_str(segment),
            }
        }
        Ok(rendered)
    }
}
