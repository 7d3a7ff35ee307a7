/// Request redirection for known shortlinks
use crate::shortlink::ShortlinkMap;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Details the host passes to a `webRequest.onBeforeRequest` listener
#[derive(Debug, Clone, Deserialize)]
pub struct RequestDetails {
    pub url: String,
}

/// Blocking response telling the host where to send the request instead
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectInstruction {
    pub redirect_url: String,
}

/// Listener bound to one snapshot of the shortlink mapping
#[derive(Debug, Clone)]
pub struct RedirectHook {
    mapping: Rc<ShortlinkMap>,
}

impl RedirectHook {
    pub fn new(mapping: Rc<ShortlinkMap>) -> Self {
        RedirectHook { mapping }
    }

    /// Exact-match lookup of the request URL; `None` lets the request through
    pub fn redirect(&self, url: &str) -> Option<RedirectInstruction> {
        match self.mapping.get(url) {
            Some(destination) => {
                log::debug!("Redirecting shortlink {} to {}", url, destination);
                Some(RedirectInstruction {
                    redirect_url: destination.to_string(),
                })
            }
            None => {
                log::trace!("No shortlink for {}", url);
                None
            }
        }
    }

    /// URL filter the registration must be scoped to
    pub fn url_patterns(&self) -> Vec<String> {
        self.mapping.aliases()
    }
}

/// The host's outgoing-request interception point.
///
/// The host only calls a listener for URLs matching the patterns it was
/// registered with, so a registration must be replaced whenever the alias
/// set changes.
pub trait RequestInterceptor {
    type Registration;

    fn register(&self, patterns: Vec<String>, hook: RedirectHook) -> Self::Registration;

    fn unregister(&self, registration: Self::Registration);
}
