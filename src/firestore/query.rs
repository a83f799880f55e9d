use super::models::{
    CollectionSelector, CompositeFilter, CompositeOperator, Document, FieldFilter, FieldOperator,
    FieldReference, QueryFilter, RunQueryRequest, RunQueryResponse, StructuredQuery,
};
use super::value::json_to_value;
use super::FirestoreError;
use crate::core::parse_error_response;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;

/// A structured query over a single collection, built independently of any
/// client so it can be reused.
#[derive(Clone, Debug)]
pub struct Query {
    pub(crate) query: StructuredQuery,
}

impl Query {
    /// Creates a query over the collection `collection_id` of the parent the
    /// query is later executed against.
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            query: StructuredQuery {
                from: vec![CollectionSelector {
                    collection_id: collection_id.into(),
                }],
                where_clause: None,
            },
        }
    }

    /// Adds a field filter. Several filters are combined with `AND`.
    pub fn where_filter<T: Serialize>(
        mut self,
        field: &str,
        op: FieldOperator,
        value: T,
    ) -> Result<Self, FirestoreError> {
        let filter = QueryFilter::FieldFilter(FieldFilter {
            field: FieldReference {
                field_path: field.to_string(),
            },
            op,
            value: json_to_value(serde_json::to_value(value)?)?,
        });

        self.query.where_clause = Some(match self.query.where_clause.take() {
            None => filter,
            Some(QueryFilter::CompositeFilter(mut composite))
                if composite.op == CompositeOperator::And =>
            {
                composite.filters.push(filter);
                QueryFilter::CompositeFilter(composite)
            }
            Some(existing) => QueryFilter::CompositeFilter(CompositeFilter {
                op: CompositeOperator::And,
                filters: vec![existing, filter],
            }),
        });

        Ok(self)
    }
}

/// A [`Query`] bound to a client and a parent document path.
pub struct ExecutableQuery<'a> {
    pub(crate) client: &'a ClientWithMiddleware,
    pub(crate) parent_path: String,
    pub(crate) query: Query,
}

impl<'a> ExecutableQuery<'a> {
    pub(crate) fn new(client: &'a ClientWithMiddleware, parent_path: String, query: Query) -> Self {
        Self {
            client,
            parent_path,
            query,
        }
    }

    /// Runs the query and returns the matching documents.
    pub async fn get(&self) -> Result<Vec<Document>, FirestoreError> {
        let url = format!("{}:runQuery", self.parent_path);

        let request = RunQueryRequest {
            structured_query: self.query.query.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Run query failed").await,
            ));
        }

        // One element per result; an empty result set still yields a single
        // element carrying only `readTime`.
        let responses: Vec<RunQueryResponse> = response.json().await?;
        Ok(responses.into_iter().filter_map(|r| r.document).collect())
    }
}
