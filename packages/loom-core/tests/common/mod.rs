//! Blog schema shared by the integration suites

#![allow(dead_code)]

use async_graphql::dynamic::Schema;
use async_graphql::{Request, Response, Value};
use loom_core::{
    field, query, resolver, resolver_of, GraphQLType, ResolverContainer, ScalarType, Silk,
};
use loom_test_utils::{post_silk, user_silk, MockUserStore, POST, USER};

/// String entry of an object value
pub fn string_of(value: &Value, key: &str) -> Option<String> {
    match value {
        Value::Object(fields) => match fields.get(key) {
            Some(Value::String(text)) => Some(text.clone()),
            _ => None,
        },
        _ => None,
    }
}

pub fn json(value: serde_json::Value) -> Value {
    Value::from_json(value).unwrap()
}

pub fn posts() -> Value {
    json(serde_json::json!([
        { "id": "10", "title": "Notes on the Analytical Engine", "authorId": "1" },
        { "id": "11", "title": "Computing Machinery and Intelligence", "authorId": "2" },
        { "id": "12", "title": "Sketch of the Engine", "authorId": "1" },
    ]))
}

/// `user(id)` and `users` backed by `store`
pub fn user_queries(store: MockUserStore) -> ResolverContainer {
    let one = store.clone();
    resolver()
        .operation(
            "user",
            query(user_silk())
                .args([("id", Silk::new(GraphQLType::non_null(ScalarType::id())))])
                .resolve(move |input, _| {
                    let store = one.clone();
                    async move {
                        let id = string_of(&input, "id").unwrap_or_default();
                        Ok(store.find(&id).unwrap_or(Value::Null))
                    }
                }),
        )
        .operation(
            "users",
            query(Silk::new(GraphQLType::list(USER.clone()))).resolve(move |_, _| {
                let store = store.clone();
                async move { Ok(Value::List(store.all())) }
            }),
        )
        .build()
}

/// `fullName` derived from the name fields, and `posts` by author
pub fn user_fields() -> ResolverContainer {
    resolver_of(user_silk())
        .operation(
            "fullName",
            field(Silk::new(ScalarType::string()))
                .derived_from(["firstName", "lastName"])
                .resolve(|user, _, _| async move {
                    let first = string_of(&user, "firstName").unwrap_or_default();
                    let last = string_of(&user, "lastName").unwrap_or_default();
                    Ok(Value::from(format!("{first} {last}")))
                }),
        )
        .operation(
            "posts",
            field(Silk::new(GraphQLType::list(POST.clone()))).resolve(|user, _, _| async move {
                let id = string_of(&user, "id");
                let Value::List(all) = posts() else {
                    return Ok(Value::Null);
                };
                let written = all
                    .into_iter()
                    .filter(|post| string_of(post, "authorId") == id)
                    .collect();
                Ok(Value::List(written))
            }),
        )
        .build()
}

/// `posts` query
pub fn post_queries() -> ResolverContainer {
    resolver()
        .operation(
            "posts",
            query(Silk::new(GraphQLType::list(post_silk().get_type())))
                .resolve(|_, _| async { Ok(posts()) }),
        )
        .build()
}

pub async fn execute(schema: &Schema, request: impl Into<Request>) -> Response {
    schema.execute(request.into()).await
}
