// src/fetch/decode.rs
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FetchError;
use crate::message::{normalize_created_at, Message};

/// Turns a response body into the page's messages.
pub trait PageDecoder: Send + Sync {
    fn decode(&self, body: &str) -> Result<Vec<Message>, FetchError>;
}

/// Supported feed envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// `{"data": {"list": [{"idx", "create_time_str", "content"}]}}`, pages from 0.
    Futu,
    /// `{"result": {"data": {"feed": {"list": [{"commentid", "create_time", "rich_text"}]}}}}`, pages from 1.
    Sina,
}

impl FeedKind {
    pub fn list_pointer(self) -> &'static str {
        match self {
            FeedKind::Futu => "/data/list",
            FeedKind::Sina => "/result/data/feed/list",
        }
    }

    pub fn first_page(self) -> u32 {
        match self {
            FeedKind::Futu => 0,
            FeedKind::Sina => 1,
        }
    }

    pub fn default_url(self) -> &'static str {
        match self {
            FeedKind::Futu => "https://news.futunn.com/main/live-list?page={page}&page_size={page_size}",
            FeedKind::Sina => {
                "http://zhibo.sina.com.cn/api/zhibo/feed?page={page}&page_size={page_size}&zhibo_id=152"
            }
        }
    }
}

#[derive(Deserialize)]
struct FutuItem {
    idx: i64,
    #[serde(default)]
    create_time_str: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(i64),
    Text(String),
}

#[derive(Deserialize)]
struct SinaItem {
    commentid: RawId,
    #[serde(default)]
    create_time: String,
    #[serde(default)]
    rich_text: String,
}

impl RawId {
    fn parse(self) -> Result<i64, FetchError> {
        match self {
            RawId::Num(n) => Ok(n),
            RawId::Text(s) => s.trim().parse().map_err(|_| FetchError::InvalidId(s)),
        }
    }
}

/// Extracts the item list at the feed kind's JSON path.
#[derive(Debug, Clone)]
pub struct JsonListDecoder {
    kind: FeedKind,
    today: Option<NaiveDate>,
}

impl JsonListDecoder {
    pub fn new(kind: FeedKind) -> Self {
        Self { kind, today: None }
    }

    /// Pin the date used to complete time-only timestamps.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}

impl PageDecoder for JsonListDecoder {
    fn decode(&self, body: &str) -> Result<Vec<Message>, FetchError> {
        let mut root: Value = serde_json::from_str(body)?;
        let pointer = self.kind.list_pointer();
        let list = root
            .pointer_mut(pointer)
            .map(Value::take)
            .filter(|v| v.is_array())
            .ok_or_else(|| FetchError::MissingField(pointer.trim_start_matches('/').replace('/', ".")))?;

        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        match self.kind {
            FeedKind::Futu => {
                let items: Vec<FutuItem> = serde_json::from_value(list)?;
                Ok(items
                    .into_iter()
                    .map(|it| Message {
                        id: it.idx,
                        created_at: normalize_created_at(&it.create_time_str, today),
                        body: it.content,
                    })
                    .collect())
            }
            FeedKind::Sina => {
                let items: Vec<SinaItem> = serde_json::from_value(list)?;
                items
                    .into_iter()
                    .map(|it| {
                        Ok(Message {
                            id: it.commentid.parse()?,
                            created_at: normalize_created_at(&it.create_time, today),
                            body: it.rich_text,
                        })
                    })
                    .collect()
            }
        }
    }
}
