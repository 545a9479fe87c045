#![forbid(unsafe_code)]

//! Blocking HTTP [`OrderingBackend`].
//!
//! Calls are made from background tasks, so the blocking client never stalls
//! the thread that owns the store.
//!
//! | Operation       | Request                                   | Body                           |
//! |-----------------|-------------------------------------------|--------------------------------|
//! | list containers | `GET {base}/containers`                   |                                |
//! | list items      | `GET {base}/containers/{id}/items`        |                                |
//! | replace order   | `PUT {base}/containers/{id}/order`        | `{"ids": [..]}`                |
//! | update item     | `PATCH {base}/items/{id}`                 | `{"containerId": .., "order": ..}` |
//!
//! Request-context entries are sent as headers.

use std::marker::PhantomData;

use ordo_core::{Container, ContainerId, Item, ItemId};
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use web_time::Duration;

use crate::backend::{BackendError, ItemPlacement, Operation, OrderingBackend, RequestContext};
use crate::config::HttpConfig;

/// Errors constructing an [`HttpBackend`].
#[derive(Debug, Error)]
pub enum HttpSetupError {
    #[error("invalid base url {url:?}: {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct OrderBody<'a> {
    ids: &'a [ItemId],
}

/// REST backend over a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpBackend<P> {
    client: Client,
    base: Url,
    _payload: PhantomData<fn() -> P>,
}

impl<P> HttpBackend<P> {
    pub fn new(config: &HttpConfig) -> Result<Self, HttpSetupError> {
        let base = Url::parse(&config.base_url).map_err(|e| HttpSetupError::InvalidBaseUrl {
            url: config.base_url.clone(),
            message: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(HttpSetupError::InvalidBaseUrl {
                url: config.base_url.clone(),
                message: "not a hierarchical URL".into(),
            });
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base,
            _payload: PhantomData,
        })
    }

    /// `{base}/{segments...}` with each segment percent-encoded.
    fn url(&self, operation: Operation, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::Transport {
                operation,
                message: format!("cannot append path to {}", self.base),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn classify(operation: Operation, err: &reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout { operation }
    } else {
        BackendError::Transport {
            operation,
            message: err.to_string(),
        }
    }
}

/// Attach context headers, send, and reject non-2xx responses. Returns the body.
fn send(
    operation: Operation,
    mut request: RequestBuilder,
    ctx: &RequestContext,
) -> Result<String, BackendError> {
    for (name, value) in ctx.entries() {
        request = request.header(name.as_str(), value.as_str());
    }
    let response = request.send().map_err(|e| classify(operation, &e))?;
    let status = response.status();
    let body = response.text().map_err(|e| classify(operation, &e))?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(BackendError::status(operation, status.as_u16(), body))
    }
}

fn decode<T: DeserializeOwned>(operation: Operation, body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| BackendError::Decode {
        operation,
        message: e.to_string(),
    })
}

impl<P> OrderingBackend for HttpBackend<P>
where
    P: DeserializeOwned + Clone + Send + 'static,
{
    type Payload = P;

    fn list_containers(&self, ctx: &RequestContext) -> Result<Vec<Container>, BackendError> {
        let op = Operation::ListContainers;
        let url = self.url(op, &["containers"])?;
        let body = send(op, self.client.get(url), ctx)?;
        decode(op, &body)
    }

    fn list_items(
        &self,
        ctx: &RequestContext,
        container: &ContainerId,
    ) -> Result<Vec<Item<P>>, BackendError> {
        let op = Operation::ListItems;
        let url = self.url(op, &["containers", container.as_str(), "items"])?;
        let body = send(op, self.client.get(url), ctx)?;
        decode(op, &body)
    }

    fn replace_order(
        &self,
        ctx: &RequestContext,
        container: &ContainerId,
        ids: &[ItemId],
    ) -> Result<(), BackendError> {
        let op = Operation::ReplaceOrder;
        let url = self.url(op, &["containers", container.as_str(), "order"])?;
        send(op, self.client.put(url).json(&OrderBody { ids }), ctx)?;
        Ok(())
    }

    fn update_item(
        &self,
        ctx: &RequestContext,
        item: &ItemId,
        placement: &ItemPlacement,
    ) -> Result<(), BackendError> {
        let op = Operation::UpdateItem;
        let url = self.url(op, &["items", item.as_str()])?;
        send(op, self.client.patch(url).json(placement), ctx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend<serde_json::Value> {
        HttpBackend::new(&HttpConfig {
            base_url: base.into(),
            timeout_ms: 1000,
        })
        .unwrap()
    }

    #[test]
    fn urls_append_and_encode_segments() {
        let http = backend("http://api.test/v1/");
        let url = http
            .url(Operation::ListItems, &["containers", "to do", "items"])
            .unwrap();
        assert_eq!(url.as_str(), "http://api.test/v1/containers/to%20do/items");

        let http = backend("http://api.test/v1");
        let url = http.url(Operation::UpdateItem, &["items", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://api.test/v1/items/a%2Fb");
    }

    #[test]
    fn rejects_bad_base_url() {
        let err = HttpBackend::<()>::new(&HttpConfig {
            base_url: "not a url".into(),
            timeout_ms: 1000,
        })
        .unwrap_err();
        assert!(matches!(err, HttpSetupError::InvalidBaseUrl { .. }));

        let err = HttpBackend::<()>::new(&HttpConfig {
            base_url: "mailto:ops@example.test".into(),
            timeout_ms: 1000,
        })
        .unwrap_err();
        assert!(matches!(err, HttpSetupError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn request_bodies_use_wire_names() {
        let placement = ItemPlacement {
            container_id: "l2".into(),
            order: 1,
        };
        assert_eq!(
            serde_json::to_value(&placement).unwrap(),
            serde_json::json!({"containerId": "l2", "order": 1})
        );
        let ids = [ItemId::from("c"), ItemId::from("a")];
        assert_eq!(
            serde_json::to_value(OrderBody { ids: &ids }).unwrap(),
            serde_json::json!({"ids": ["c", "a"]})
        );
    }

    #[test]
    fn decode_errors_are_typed() {
        let err = decode::<Vec<Container>>(Operation::ListContainers, "{oops").unwrap_err();
        assert!(matches!(err, BackendError::Decode { .. }));

        let containers: Vec<Container> = decode(
            Operation::ListContainers,
            r#"[{"id":"l1","name":"One","order":0}]"#,
        )
        .unwrap();
        assert_eq!(containers[0].id, ContainerId::from("l1"));
    }
}
