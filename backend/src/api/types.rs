//! Request and response envelopes for `/graphql`.
//!
//! Success: `{"data": {"read": "name$age\nJohn$30"}}`
//!
//! Failure: `{"data": {"read": null}, "errors": [{"message": ..., "extensions": {...}}]}`

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::PipelineError;

/// JSON body of a POST request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: Option<String>,
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Option<Map<String, Value>>,
}

/// Query string of a GET request. `variables` is JSON-encoded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    pub query: Option<String>,
    pub operation_name: Option<String>,
    pub variables: Option<String>,
}

impl TryFrom<QueryParams> for QueryRequest {
    type Error = PipelineError;

    fn try_from(params: QueryParams) -> Result<Self, Self::Error> {
        let variables = match params.variables.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => serde_json::from_str::<Option<Map<String, Value>>>(raw).map_err(|e| {
                PipelineError::BadRequest(format!("Variables are invalid JSON: {}", e))
            })?,
        };
        Ok(QueryRequest {
            query: params.query,
            operation_name: params.operation_name,
            variables,
        })
    }
}

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorEntry>,
}

/// One entry of `errors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
    pub extensions: ErrorExtensions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorExtensions {
    pub code: String,
    pub request_id: String,
}

impl ErrorEntry {
    pub fn from_error(err: &PipelineError, request_id: &str) -> Self {
        Self {
            message: err.to_string(),
            extensions: ErrorExtensions {
                code: err.code().to_string(),
                request_id: request_id.to_string(),
            },
        }
    }
}

impl QueryResponse {
    /// `{"data": {key: text}}`
    pub fn success(key: &str, text: String) -> Self {
        Self {
            data: Some(json!({ key: text })),
            errors: Vec::new(),
        }
    }

    /// The operation ran and failed: the field resolves to null.
    pub fn operation_error(key: &str, err: &PipelineError, request_id: &str) -> Self {
        Self {
            data: Some(json!({ key: null })),
            errors: vec![ErrorEntry::from_error(err, request_id)],
        }
    }

    /// The request never reached an operation.
    pub fn request_error(err: &PipelineError, request_id: &str) -> Self {
        Self {
            data: None,
            errors: vec![ErrorEntry::from_error(err, request_id)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let json = serde_json::to_value(QueryResponse::success("read", "a$b".into())).unwrap();
        assert_eq!(json, json!({ "data": { "read": "a$b" } }));
    }

    #[test]
    fn test_operation_error_shape() {
        let err = PipelineError::Network("connection refused".into());
        let json =
            serde_json::to_value(QueryResponse::operation_error("read", &err, "req-1")).unwrap();
        assert_eq!(json["data"]["read"], Value::Null);
        assert_eq!(json["errors"][0]["extensions"]["code"], "NETWORK_ERROR");
        assert_eq!(json["errors"][0]["extensions"]["requestId"], "req-1");
        assert!(json["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
    }

    #[test]
    fn test_request_error_has_null_data() {
        let err = PipelineError::BadRequest("no query".into());
        let json = serde_json::to_value(QueryResponse::request_error(&err, "req-2")).unwrap();
        assert_eq!(json["data"], Value::Null);
        assert_eq!(json["errors"][0]["extensions"]["code"], "BAD_REQUEST");
    }

    #[test]
    fn test_request_body_parsing() {
        let body = r#"{"query":"{ read }","operationName":null,"variables":null}"#;
        let request: QueryRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.query.as_deref(), Some("{ read }"));
        assert!(request.variables.is_none());
    }

    #[test]
    fn test_params_variables_decoding() {
        let params = QueryParams {
            query: Some("mutation($c: String!) { uploadCSV(fileContent: $c) }".into()),
            operation_name: None,
            variables: Some(r#"{"c":"a,b"}"#.into()),
        };
        let request = QueryRequest::try_from(params).unwrap();
        assert_eq!(request.variables.unwrap()["c"], "a,b");

        let bad = QueryParams {
            variables: Some("{not json".into()),
            ..Default::default()
        };
        assert!(QueryRequest::try_from(bad).is_err());
    }
}
