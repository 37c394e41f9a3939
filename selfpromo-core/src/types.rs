use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A submission (link or self post).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub created_utc: DateTime<Utc>,
    pub subreddit: String,
    pub title: String,
    pub selftext: String,
    pub url: String,
    pub permalink: String,
    pub link_flair_text: Option<String>,
    pub is_self: bool,
    pub is_original_content: bool,
    /// Removed by a moderator, the spam filter, or banned_by set.
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub created_utc: DateTime<Utc>,
    pub subreddit: String,
    pub body: String,
    /// Id of the parent submission, without the `t3_` prefix.
    pub link_id: String,
    /// Author of the parent submission.
    pub link_author: Option<String>,
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Item {
    Post(Post),
    Comment(Comment),
}

impl Item {
    pub fn id(&self) -> &str {
        match self {
            Item::Post(post) => &post.id,
            Item::Comment(comment) => &comment.id,
        }
    }

    /// Reddit fullname (`t3_...` / `t1_...`) used by the write endpoints.
    pub fn fullname(&self) -> String {
        match self {
            Item::Post(post) => post.fullname(),
            Item::Comment(comment) => format!("t1_{}", comment.id),
        }
    }

    pub fn author(&self) -> &str {
        match self {
            Item::Post(post) => &post.author,
            Item::Comment(comment) => &comment.author,
        }
    }

    pub fn created_utc(&self) -> DateTime<Utc> {
        match self {
            Item::Post(post) => post.created_utc,
            Item::Comment(comment) => comment.created_utc,
        }
    }

    pub fn subreddit(&self) -> &str {
        match self {
            Item::Post(post) => &post.subreddit,
            Item::Comment(comment) => &comment.subreddit,
        }
    }

    pub fn is_removed(&self) -> bool {
        match self {
            Item::Post(post) => post.removed,
            Item::Comment(comment) => comment.removed,
        }
    }

    /// Subreddit names are case-insensitive on Reddit.
    pub fn is_in_area(&self, area: &str) -> bool {
        self.subreddit().eq_ignore_ascii_case(area)
    }
}

impl Post {
    pub fn fullname(&self) -> String {
        format!("t3_{}", self.id)
    }

    pub fn is_in_area(&self, area: &str) -> bool {
        self.subreddit.eq_ignore_ascii_case(area)
    }
}

impl From<Post> for Item {
    fn from(post: Post) -> Self {
        Item::Post(post)
    }
}

impl From<Comment> for Item {
    fn from(comment: Comment) -> Self {
        Item::Comment(comment)
    }
}
