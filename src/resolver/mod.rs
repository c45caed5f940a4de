//! GraphQL execution against a [`Database`]
//!
//! ```text
//! query text ─parse─▶ mdgql::Document ─pick operation─▶ coerce variables
//!            ─execute over the registry─▶ { data, errors }
//! ```
//!
//! Errors before execution (syntax, unknown operation, missing variables)
//! yield `data: null`. Errors while executing are field-level: the field
//! resolves to `null`, the error carries the response path, and the rest
//! of the result is kept.

mod executor;
pub mod filter;
pub mod mutation;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::database::Database;
use crate::error::Error;
use executor::Executor;

/// Body of a GraphQL-over-HTTP request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(default)]
    pub variables: Option<Map<String, Value>>,
    #[serde(default)]
    pub operation_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQLError {
    pub message: String,
    /// Response keys and list indexes leading to the failed field
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Value>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>, path: Vec<Value>) -> Self {
        Self {
            message: message.into(),
            path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl ExecutionResult {
    fn failed(error: Error) -> Self {
        Self {
            data: Value::Null,
            errors: vec![GraphQLError::new(error.to_string(), Vec::new())],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Execute the only operation in `query`
pub async fn resolve(db: &Database, query: &str, variables: Map<String, Value>) -> ExecutionResult {
    resolve_request(
        db,
        GraphQLRequest {
            query: query.to_string(),
            variables: Some(variables),
            operation_name: None,
        },
    )
    .await
}

pub async fn resolve_request(db: &Database, request: GraphQLRequest) -> ExecutionResult {
    let document = match mdgql::parse(&request.query) {
        Ok(document) => document,
        Err(e) => return ExecutionResult::failed(e.into()),
    };
    let operation = match document.operation(request.operation_name.as_deref()) {
        Some(operation) => operation,
        None => {
            let message = match (&request.operation_name, document.operations().count()) {
                (Some(name), _) => format!("Unknown operation named '{}'", name),
                (None, 0) => "Document contains no operation".to_string(),
                (None, _) => "Must provide an operation name when the document contains several".to_string(),
            };
            return ExecutionResult::failed(Error::query(message));
        }
    };
    let snapshot = match db.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return ExecutionResult::failed(e),
    };
    let variables = match coerce_variables(operation, request.variables.unwrap_or_default()) {
        Ok(variables) => variables,
        Err(e) => return ExecutionResult::failed(e),
    };

    tracing::debug!(
        operation = operation.name.as_deref().unwrap_or("anonymous"),
        kind = operation.operation.as_str(),
        "executing"
    );
    let executor = Executor::new(db, snapshot, &document, variables);
    let data = executor.execute(operation).await;
    ExecutionResult {
        data,
        errors: executor.into_errors(),
    }
}

/// Apply defaults and reject missing required variables
fn coerce_variables(operation: &mdgql::OperationDefinition, mut provided: Map<String, Value>) -> Result<Map<String, Value>, Error> {
    for definition in &operation.variable_definitions {
        let given = provided.get(&definition.name).map(|v| !v.is_null()).unwrap_or(false);
        if given {
            continue;
        }
        if let Some(default) = &definition.default_value {
            provided.insert(definition.name.clone(), default.to_json(&Map::new()));
        } else if matches!(definition.ty, mdgql::Type::NonNull(_)) {
            return Err(Error::query(format!(
                "Variable '${}' of required type '{}' was not provided",
                definition.name,
                type_string(&definition.ty)
            )));
        }
    }
    Ok(provided)
}

fn type_string(ty: &mdgql::Type) -> String {
    match ty {
        mdgql::Type::Named(name) => name.clone(),
        mdgql::Type::List(inner) => format!("[{}]", type_string(inner)),
        mdgql::Type::NonNull(inner) => format!("{}!", type_string(inner)),
    }
}
