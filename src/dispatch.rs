//! The single place where provider calls are made and their results classified.
//!
//! Every client operation becomes a `Call`, which the `Dispatcher` sends through a freshly connected
//! `ClientHandle`. Whatever comes back, whether a list, a raw transport response, a structured object,
//! or a provider api error, is collapsed into one `CallOutcome` of body, status code and message.
use crate::error::{Error, ProviderCallError};
use crate::operation::{Operation, Verb};
use crate::provider::{ApiResponse, CallError, ClientHandle, ProviderConnection, RawResponse};

use serde_json::Value;

use std::time::Instant;

pub const DEFAULT_API_VERSION: &str = "v1";

const STATUS_OK: u16 = 200;
const STATUS_NOT_FOUND: u16 = 404;

/// A provider call together with its positional parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Call<'a> {
    Get { name: &'a str, namespace: &'a str },
    List { namespace: &'a str },
    Create { body: &'a Value },
    Patch { name: &'a str, body: &'a Value, namespace: &'a str },
    Update { body: &'a Value },
    Delete { name: &'a str, namespace: &'a str },
}

impl<'a> Call<'a> {
    pub fn verb(&self) -> Verb {
        match *self {
            Call::Get { .. } => Verb::Get,
            Call::List { .. } => Verb::List,
            Call::Create { .. } => Verb::Create,
            Call::Patch { .. } => Verb::Patch,
            Call::Update { .. } => Verb::Update,
            Call::Delete { .. } => Verb::Delete,
        }
    }

    fn invoke(&self, handle: &mut dyn ClientHandle, kind: &str) -> Result<ApiResponse, CallError> {
        match *self {
            Call::Get { name, namespace } => handle.get(kind, name, namespace),
            Call::List { namespace } => handle.list(kind, namespace),
            Call::Create { body } => handle.create(kind, body),
            Call::Patch { name, body, namespace } => handle.patch(kind, name, body, namespace),
            Call::Update { body } => handle.update(kind, body),
            Call::Delete { name, namespace } => handle.delete(kind, name, namespace),
        }
    }
}

/// Result of a single provider call. `body` is `Value::Null` when the call produced nothing,
/// an array for list results, and the structured entity otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub body: Value,
    pub status: u16,
    pub message: String,
}

impl CallOutcome {
    fn ok(body: Value) -> CallOutcome {
        CallOutcome {
            body,
            status: STATUS_OK,
            message: String::new(),
        }
    }

    /// Only a 200 counts. A 201 or 202 is a failure like any other status
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn is_not_found(&self) -> bool {
        self.status == STATUS_NOT_FOUND
    }

    /// Success returns the body, a 404 returns `None`, and anything else is an error
    pub(crate) fn into_optional(self, context: CallContext<'_>) -> Result<Option<Value>, Error> {
        if self.is_not_found() {
            log::debug!("{} found nothing for {}", context.operation, context.describe());
            Ok(None)
        } else {
            self.into_required(context).map(Some)
        }
    }

    /// Success returns the body, and anything else, including a 404, is an error
    pub(crate) fn into_required(self, context: CallContext<'_>) -> Result<Value, Error> {
        if self.is_success() {
            Ok(self.body)
        } else {
            log::error!(
                "{} failed for {} with status: {}, message: {}",
                context.operation,
                context.describe(),
                self.status,
                self.message
            );
            Err(ProviderCallError {
                kind: context.kind.to_owned(),
                name: context.name.map(str::to_owned),
                namespace: context.namespace.map(str::to_owned),
                operation: context.operation.method_name(),
                status: self.status,
                message: self.message,
            }
            .into())
        }
    }

    /// Like `into_required`, but the body must also be a list of entities, either as a bare array
    /// or as an object holding an `items` array
    pub(crate) fn into_list(self, context: CallContext<'_>) -> Result<Vec<Value>, Error> {
        let status = self.status;
        match self.into_required(context.clone())? {
            Value::Array(items) => Ok(items),
            Value::Object(mut map) => match map.remove("items") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(context.unexpected_shape(status, "an object without an items array")),
            },
            Value::Null => Err(context.unexpected_shape(status, "an empty body")),
            _ => Err(context.unexpected_shape(status, "a scalar value")),
        }
    }
}

/// What a call was about, so that a failure can say so
#[derive(Clone)]
pub(crate) struct CallContext<'a> {
    pub kind: &'a str,
    pub name: Option<&'a str>,
    pub namespace: Option<&'a str>,
    pub operation: &'a Operation,
}

impl<'a> CallContext<'a> {
    fn describe(&self) -> String {
        format!(
            "{} {}/{}",
            self.kind,
            self.namespace.unwrap_or(""),
            self.name.unwrap_or("")
        )
    }

    fn unexpected_shape(&self, status: u16, actual: &str) -> Error {
        log::error!("{} for {} expected a list but got {}", self.operation, self.describe(), actual);
        ProviderCallError {
            kind: self.kind.to_owned(),
            name: self.name.map(str::to_owned),
            namespace: self.namespace.map(str::to_owned),
            operation: self.operation.method_name(),
            status,
            message: format!("expected a list of {}, got {}", self.kind, actual),
        }
        .into()
    }
}

/// Sends calls through the connection of a single provider
#[derive(Clone, Copy)]
pub struct Dispatcher<'a> {
    provider: &'a dyn ProviderConnection,
}

impl<'a> Dispatcher<'a> {
    pub fn new(provider: &'a dyn ProviderConnection) -> Dispatcher<'a> {
        Dispatcher { provider }
    }

    /// Connects, discovers if needed, performs the call, and classifies the result.
    /// Provider api errors become part of the outcome. Transport errors are returned as `Err`.
    pub fn dispatch(&self, kind: &str, call: Call<'_>, api_version: &str) -> Result<CallOutcome, Error> {
        let operation = Operation::new(call.verb(), kind);
        let start_time = Instant::now();
        log::debug!("Dispatching {} with apiVersion: {}", operation, api_version);

        let mut handle = self
            .provider
            .connect_client(api_version, &operation)
            .map_err(|err| {
                log::error!("Failed to connect for {} with apiVersion: {}, err: {}", operation, api_version, err);
                Error::Transport(err)
            })?;

        let result = Dispatcher::discover_if_needed(handle.as_mut())
            .and_then(|_| call.invoke(handle.as_mut(), kind));
        let outcome = Dispatcher::classify(result)?;

        log::debug!(
            "Finished {} with status: {}, duration: {}ms",
            operation,
            outcome.status,
            start_time.elapsed().as_millis()
        );
        Ok(outcome)
    }

    fn discover_if_needed(handle: &mut dyn ClientHandle) -> Result<(), CallError> {
        if !handle.is_discovered() {
            handle.discover()?;
        }
        Ok(())
    }

    fn classify(result: Result<ApiResponse, CallError>) -> Result<CallOutcome, Error> {
        match result {
            Ok(ApiResponse::List(items)) => Ok(CallOutcome::ok(Value::Array(items))),
            Ok(ApiResponse::Object(value)) => Ok(CallOutcome::ok(value)),
            Ok(ApiResponse::Raw(raw)) => Dispatcher::classify_raw(raw),
            Err(CallError::Api(api_error)) => Ok(CallOutcome {
                body: Value::Null,
                status: api_error.code,
                message: api_error.message,
            }),
            Err(CallError::Transport(err)) => Err(Error::Transport(err)),
        }
    }

    /// Only the payload of a 200 has to be json. Error pages from proxies and gateways keep their
    /// status, with whatever text they had appended to the message.
    fn classify_raw(raw: RawResponse) -> Result<CallOutcome, Error> {
        let RawResponse { status, body, description } = raw;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(CallOutcome {
                body: Value::Null,
                status,
                message: description,
            });
        }
        if status == STATUS_OK {
            return Ok(CallOutcome {
                body: serde_json::from_slice(body.as_ref())?,
                status,
                message: description,
            });
        }

        match serde_json::from_slice::<Value>(body.as_ref()) {
            Ok(value) => Ok(CallOutcome {
                body: value,
                status,
                message: description,
            }),
            Err(_) => {
                let text = String::from_utf8_lossy(body.as_ref());
                let message = if description.is_empty() {
                    text.trim().to_owned()
                } else {
                    format!("{}: {}", description, text.trim())
                };
                Ok(CallOutcome {
                    body: Value::Null,
                    status,
                    message,
                })
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::provider::ApiError;
    use crate::testkit::FakeProvider;
    use bytes::Bytes;
    use serde_json::json;

    #[test]
    fn list_results_become_an_array_body() {
        let outcome = Dispatcher::classify(Ok(ApiResponse::List(vec![json!({"a": 1}), json!({"b": 2})])))
            .expect("classify failed");
        assert_eq!(200, outcome.status);
        assert_eq!(json!([{"a": 1}, {"b": 2}]), outcome.body);
    }

    #[test]
    fn accepted_is_not_success() {
        let raw = RawResponse {
            status: 202,
            body: Bytes::from_static(br#"{"kind": "Status", "status": "Success"}"#),
            description: "Accepted".to_owned(),
        };
        let outcome = Dispatcher::classify(Ok(ApiResponse::Raw(raw))).expect("classify failed");
        assert_eq!(202, outcome.status);
        assert_eq!("Accepted", outcome.message);
        assert_eq!(json!({"kind": "Status", "status": "Success"}), outcome.body);
        assert!(!outcome.is_success());

        let operation = Operation::new(Verb::Delete, "Service");
        let err = outcome
            .into_optional(CallContext {
                kind: "Service",
                name: Some("mysql"),
                namespace: Some("testproject"),
                operation: &operation,
            })
            .unwrap_err();
        assert_eq!(Some(202), err.status());
    }

    #[test]
    fn created_is_not_success() {
        let outcome = CallOutcome {
            body: json!({"kind": "Service"}),
            status: 201,
            message: "Created".to_owned(),
        };
        assert!(!outcome.is_success());
        assert!(CallOutcome::ok(Value::Null).is_success());
    }

    #[test]
    fn empty_raw_body_is_null() {
        let raw = RawResponse {
            status: 200,
            body: Bytes::new(),
            description: "OK".to_owned(),
        };
        let outcome = Dispatcher::classify(Ok(ApiResponse::Raw(raw))).expect("classify failed");
        assert_eq!(Value::Null, outcome.body);
    }

    #[test]
    fn unparseable_ok_body_is_a_decode_error() {
        let raw = RawResponse {
            status: 200,
            body: Bytes::from_static(b"<html>not json</html>"),
            description: "OK".to_owned(),
        };
        let result = Dispatcher::classify(Ok(ApiResponse::Raw(raw)));
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn html_error_page_keeps_its_status() {
        let raw = RawResponse {
            status: 502,
            body: Bytes::from_static(b"<html>Bad Gateway</html>\n"),
            description: "Bad Gateway".to_owned(),
        };
        let outcome = Dispatcher::classify(Ok(ApiResponse::Raw(raw))).expect("error pages must be classified");
        assert_eq!(502, outcome.status);
        assert_eq!(Value::Null, outcome.body);
        assert_eq!("Bad Gateway: <html>Bad Gateway</html>", outcome.message);

        let operation = Operation::new(Verb::Get, "Service");
        let err = outcome
            .into_required(CallContext {
                kind: "Service",
                name: Some("mysql"),
                namespace: Some("testproject"),
                operation: &operation,
            })
            .unwrap_err();
        assert_eq!(Some(502), err.status());
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn only_list_shapes_become_lists() {
        let operation = Operation::new(Verb::List, "Service");
        let context = || CallContext {
            kind: "Service",
            name: None,
            namespace: Some("testproject"),
            operation: &operation,
        };

        let items = CallOutcome::ok(json!({"kind": "ServiceList", "items": [{"a": 1}]}))
            .into_list(context())
            .unwrap();
        assert_eq!(vec![json!({"a": 1})], items);
        let items = CallOutcome::ok(json!([{"b": 2}])).into_list(context()).unwrap();
        assert_eq!(vec![json!({"b": 2})], items);

        for body in vec![Value::Null, json!({"kind": "Service"}), json!({"items": "nope"}), json!(7)] {
            let err = CallOutcome::ok(body.clone()).into_list(context()).unwrap_err();
            assert_eq!(Some(200), err.status(), "body: {}", body);
            assert!(err.to_string().contains("expected a list of Service"));
        }
    }

    #[test]
    fn failed_discovery_is_classified() {
        let provider = FakeProvider::new();
        provider.fail_next_discovery(403, "services is forbidden");
        let outcome = Dispatcher::new(&provider)
            .dispatch("Service", Call::Get { name: "mysql", namespace: "testproject" }, DEFAULT_API_VERSION)
            .expect("discovery errors must not propagate");
        assert_eq!(403, outcome.status);
        assert_eq!("services is forbidden", outcome.message);
        assert_eq!(1, provider.discovery_count());

        let outcome = Dispatcher::new(&provider)
            .dispatch("Service", Call::Get { name: "mysql", namespace: "testproject" }, DEFAULT_API_VERSION)
            .unwrap();
        assert_eq!(404, outcome.status);
        assert_eq!(2, provider.discovery_count());
    }

    #[test]
    fn discovered_handles_are_not_discovered_again() {
        let provider = FakeProvider::new();
        provider.set_handles_discovered(true);
        provider.fail_next_discovery(503, "unavailable");
        let outcome = Dispatcher::new(&provider)
            .dispatch("Service", Call::List { namespace: "testproject" }, DEFAULT_API_VERSION)
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(0, provider.discovery_count());
        assert_eq!(1, provider.calls().len());
    }

    #[test]
    fn api_errors_are_caught() {
        let outcome = Dispatcher::classify(Err(CallError::Api(ApiError::not_found("Service", "mysql"))))
            .expect("api errors must not propagate");
        assert_eq!(404, outcome.status);
        assert_eq!(Value::Null, outcome.body);
        assert!(outcome.message.contains("mysql"));
    }

    #[test]
    fn transport_errors_propagate() {
        let err: crate::error::BoxError = "connection reset".into();
        let result = Dispatcher::classify(Err(CallError::Transport(err)));
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[test]
    fn not_found_is_absence_only_where_tolerated() {
        let operation = Operation::new(Verb::Create, "Service");
        let context = || CallContext {
            kind: "Service",
            name: Some("mysql"),
            namespace: Some("testproject"),
            operation: &operation,
        };
        let not_found = CallOutcome {
            body: Value::Null,
            status: 404,
            message: "not found".to_owned(),
        };
        assert_eq!(None, not_found.clone().into_optional(context()).unwrap());
        let err = not_found.into_required(context()).unwrap_err();
        assert_eq!(Some(404), err.status());
    }
}
