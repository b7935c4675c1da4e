use async_graphql::Response;

/// Data of a response as JSON, failing when the response carries errors
pub fn response_json(response: Response) -> anyhow::Result<serde_json::Value> {
    if !response.errors.is_empty() {
        anyhow::bail!("response has errors: {:?}", error_messages(&response));
    }
    Ok(response.data.into_json()?)
}

/// Messages of every error in a response, in order
pub fn error_messages(response: &Response) -> Vec<String> {
    response
        .errors
        .iter()
        .map(|error| error.message.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use async_graphql::{ServerError, Value};

    use super::*;

    #[test]
    fn test_response_json() {
        let response = Response::new(Value::from_json(serde_json::json!({ "a": 1 })).unwrap());
        assert_eq!(response_json(response).unwrap(), serde_json::json!({ "a": 1 }));
    }

    #[test]
    fn test_errors_fail() {
        let response = Response::from_errors(vec![ServerError::new("boom", None)]);
        assert_eq!(error_messages(&response), vec!["boom"]);
        assert!(response_json(response).is_err());
    }
}
