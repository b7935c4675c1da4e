//! Field selection analysis through executed queries

mod common;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_graphql::{Request, Value, Variables};
use loom_core::{
    field, get_deep_resolving_fields, query, resolver, resolver_of, use_resolving_fields, weave,
    GraphQLType, ResolverContainer, ResolvingFields, ScalarType, Silk,
};
use loom_test_utils::{post_silk, MockUserStore, USER};
use serde_json::json;

use common::{execute, string_of, user_fields};

#[derive(Default)]
struct Seen {
    shallow: Option<ResolvingFields>,
    deep: BTreeMap<String, ResolvingFields>,
}

type Shared = Arc<Mutex<Seen>>;

/// `users` recording what it was asked for
fn users(store: MockUserStore, seen: Shared) -> ResolverContainer {
    resolver()
        .operation(
            "users",
            query(Silk::new(GraphQLType::list(USER.clone()))).resolve(move |_, payload| {
                let store = store.clone();
                let seen = seen.clone();
                async move {
                    let mut seen = seen.lock().unwrap();
                    seen.shallow = use_resolving_fields();
                    seen.deep = get_deep_resolving_fields(&payload);
                    Ok(Value::List(store.all()))
                }
            }),
        )
        .build()
}

/// `Post.headline` derived from the title
fn headline() -> ResolverContainer {
    resolver_of(post_silk())
        .operation(
            "headline",
            field(Silk::new(ScalarType::string()))
                .derived_from(["title"])
                .resolve(|post, _, _| async move {
                    let title = string_of(&post, "title").unwrap_or_default();
                    Ok(Value::from(title.to_uppercase()))
                }),
        )
        .build()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|item| item.to_string()).collect()
}

const PROFILE: &str = r#"
    query Profile($withPosts: Boolean!) {
        users {
            __typename
            handle: id
            ...Names
            ... on User { role }
            posts @include(if: $withPosts) { headline id }
        }
    }
    fragment Names on User { fullName email @skip(if: true) }
"#;

fn profile(with_posts: bool) -> Request {
    Request::new(PROFILE).variables(Variables::from_json(json!({ "withPosts": with_posts })))
}

#[tokio::test]
async fn test_direct_children_with_derived_expansion() {
    let seen = Shared::default();
    let schema = weave([
        users(MockUserStore::seeded(), seen.clone()),
        user_fields(),
        headline(),
    ])
    .unwrap();

    let response = execute(&schema, profile(true)).await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);

    let seen = seen.lock().unwrap();
    let fields = seen.shallow.clone().unwrap();
    assert_eq!(fields.requested_fields, set(&["fullName", "id", "posts", "role"]));
    assert_eq!(fields.derived_fields, set(&["fullName"]));
    assert_eq!(fields.derived_dependencies, set(&["firstName", "lastName"]));
    assert_eq!(
        fields.selected_fields,
        set(&["firstName", "id", "lastName", "posts", "role"])
    );
}

#[tokio::test]
async fn test_every_level_is_keyed_by_path() {
    let seen = Shared::default();
    let schema = weave([
        users(MockUserStore::seeded(), seen.clone()),
        user_fields(),
        headline(),
    ])
    .unwrap();

    execute(&schema, profile(true)).await;
    let deep = seen.lock().unwrap().deep.clone();
    assert_eq!(deep.keys().cloned().collect::<Vec<_>>(), ["", "posts"]);
    assert_eq!(deep[""].derived_fields, set(&["fullName"]));

    let posts = &deep["posts"];
    assert_eq!(posts.requested_fields, set(&["headline", "id"]));
    assert_eq!(posts.derived_fields, set(&["headline"]));
    assert_eq!(posts.selected_fields, set(&["id", "title"]));
}

#[tokio::test]
async fn test_include_variable_drops_a_branch() {
    let seen = Shared::default();
    let schema = weave([
        users(MockUserStore::seeded(), seen.clone()),
        user_fields(),
        headline(),
    ])
    .unwrap();

    let response = execute(&schema, profile(false)).await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen.shallow.as_ref().unwrap().requested_fields,
        set(&["fullName", "id", "role"])
    );
    assert!(!seen.deep.contains_key("posts"));
}

#[tokio::test]
async fn test_nested_field_sees_its_own_children() {
    let seen: Arc<Mutex<Option<ResolvingFields>>> = Arc::default();
    let recorder = {
        let seen = seen.clone();
        resolver_of(loom_test_utils::user_silk())
            .operation(
                "latest",
                field(post_silk()).resolve(move |_, _, _| {
                    let seen = seen.clone();
                    async move {
                        *seen.lock().unwrap() = use_resolving_fields();
                        Ok(Value::Null)
                    }
                }),
            )
            .build()
    };

    let schema = weave([
        common::user_queries(MockUserStore::seeded()),
        headline(),
        recorder,
    ])
    .unwrap();
    execute(&schema, r#"{ user(id: "1") { id latest { headline authorId } } }"#).await;

    let fields = seen.lock().unwrap().clone().unwrap();
    assert_eq!(fields.requested_fields, set(&["authorId", "headline"]));
    assert_eq!(fields.selected_fields, set(&["authorId", "title"]));
}

#[tokio::test]
async fn test_direct_calls_have_no_selection() {
    let seen = Shared::default();
    let container = users(MockUserStore::seeded(), seen.clone());

    let result = container.executor().call("users", Value::Null).await.unwrap();
    assert!(matches!(result, Value::List(ref users) if users.len() == 2));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.shallow, Some(ResolvingFields::default()));
    assert_eq!(seen.deep.keys().cloned().collect::<Vec<_>>(), [""]);
}
