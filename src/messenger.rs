/// Request/response contract between the UI pages and the background store
use crate::error::MessengerError;
use crate::redirect::RequestInterceptor;
use crate::storage::ShortlinkStorage;
use crate::store::ShortlinkStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Result<T> = std::result::Result<T, MessengerError>;

/// Numeric message kinds; plain numbers survive structured cloning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Add = 1,
    Delete = 2,
    Fetch = 3,
}

impl MessageType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(MessageType::Add),
            2 => Some(MessageType::Delete),
            3 => Some(MessageType::Fetch),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}

/// Message as it crosses `runtime.sendMessage`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortlink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Add { alias: String, destination: String },
    Delete { alias: String },
    Fetch,
}

impl TryFrom<Message> for Request {
    type Error = MessengerError;

    fn try_from(message: Message) -> Result<Request> {
        let code = message
            .message_type
            .ok_or_else(|| MessengerError::Malformed("missing messageType".to_string()))?;
        let kind = MessageType::from_code(code).ok_or(MessengerError::Unsupported(code))?;

        let missing = |field: &str| MessengerError::Malformed(format!("missing {}", field));

        match kind {
            MessageType::Add => Ok(Request::Add {
                alias: message.shortlink.ok_or_else(|| missing("shortlink"))?,
                destination: message.result.ok_or_else(|| missing("result"))?,
            }),
            MessageType::Delete => Ok(Request::Delete {
                alias: message.shortlink.ok_or_else(|| missing("shortlink"))?,
            }),
            MessageType::Fetch => Ok(Request::Fetch),
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Message {
        match request {
            Request::Add { alias, destination } => Message {
                message_type: Some(MessageType::Add.code()),
                shortlink: Some(alias),
                result: Some(destination),
            },
            Request::Delete { alias } => Message {
                message_type: Some(MessageType::Delete.code()),
                shortlink: Some(alias),
                result: None,
            },
            Request::Fetch => Message {
                message_type: Some(MessageType::Fetch.code()),
                ..Message::default()
            },
        }
    }
}

/// Every message gets exactly one response; failures are carried as
/// `Error` values rather than as rejections of the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Response {
    Done,
    Shortlinks { shortlinks: BTreeMap<String, String> },
    Error { message: String },
}

impl Response {
    pub fn error(err: impl std::fmt::Display) -> Response {
        Response::Error {
            message: err.to_string(),
        }
    }
}

/// Background-side entry point for a raw message
pub async fn handle_message<S, I>(store: &ShortlinkStore<S, I>, message: Message) -> Response
where
    S: ShortlinkStorage,
    I: RequestInterceptor,
{
    match Request::try_from(message) {
        Ok(request) => handle_request(store, request).await,
        Err(e) => {
            log::warn!("Rejecting message: {}", e);
            Response::error(e)
        }
    }
}

pub async fn handle_request<S, I>(store: &ShortlinkStore<S, I>, request: Request) -> Response
where
    S: ShortlinkStorage,
    I: RequestInterceptor,
{
    let outcome = match request {
        Request::Add { alias, destination } => store.add_shortlink(&alias, &destination).await,
        Request::Delete { alias } => store.delete_shortlink(&alias).await,
        Request::Fetch => {
            return Response::Shortlinks {
                shortlinks: store.fetch_shortlinks(),
            };
        }
    };

    match outcome {
        Ok(()) => Response::Done,
        Err(e) => Response::error(e),
    }
}

/// Channel from a UI page to the background context
#[async_trait(?Send)]
pub trait MessageTransport {
    async fn send(&self, message: Message) -> Result<Response>;
}

/// UI-side client of the background store
#[derive(Debug, Clone)]
pub struct ShortlinkMessenger<T> {
    transport: T,
}

impl<T: MessageTransport> ShortlinkMessenger<T> {
    pub fn new(transport: T) -> Self {
        ShortlinkMessenger { transport }
    }

    /// `alias` may omit the URL scheme
    pub async fn send_add(&self, alias: &str, destination: &str) -> Result<()> {
        let request = Request::Add {
            alias: alias.to_string(),
            destination: destination.to_string(),
        };
        expect_done(self.transport.send(request.into()).await?)
    }

    pub async fn send_delete(&self, alias: &str) -> Result<()> {
        let request = Request::Delete {
            alias: alias.to_string(),
        };
        expect_done(self.transport.send(request.into()).await?)
    }

    /// Display-form mapping currently loaded in the background
    pub async fn send_fetch(&self) -> Result<BTreeMap<String, String>> {
        match self.transport.send(Request::Fetch.into()).await? {
            Response::Shortlinks { shortlinks } => Ok(shortlinks),
            Response::Error { message } => Err(MessengerError::Rejected(message)),
            Response::Done => Err(MessengerError::Malformed(
                "expected shortlinks in response".to_string(),
            )),
        }
    }
}

fn expect_done(response: Response) -> Result<()> {
    match response {
        Response::Done => Ok(()),
        Response::Error { message } => Err(MessengerError::Rejected(message)),
        Response::Shortlinks { .. } => Err(MessengerError::Malformed(
            "unexpected shortlinks in response".to_string(),
        )),
    }
}
