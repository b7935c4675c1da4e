//! Schema assembly: deduplication, naming, merging and emission

mod common;

use assert_matches::assert_matches;
use async_graphql::Value;
use loom_core::{
    field, mutation, query, resolver, resolver_of, weave, CoreSchemaConfig, EnumType,
    GraphQLType, InputObjectType, InterfaceType, ObjectType, ScalarType, SchemaLoom, Silk,
    UnionType, WeaveError, CORE_SCHEMA_CONFIG,
};
use loom_test_utils::{init_tracing, response_json, user_silk, MockUserStore, POST, USER};
use serde_json::json;
use test_log::test;

use common::{execute, post_queries, string_of, user_fields, user_queries};

fn blog() -> async_graphql::dynamic::Schema {
    weave([
        user_queries(MockUserStore::seeded()),
        user_fields(),
        post_queries(),
    ])
    .unwrap()
}

#[test]
fn test_blog_schema_types() {
    let sdl = blog().sdl();
    assert!(sdl.contains("type User"));
    assert!(sdl.contains("fullName: String"));
    assert!(sdl.contains("enum Role"));
    assert_eq!(sdl.matches("type Post {").count(), 1);
    assert!(!sdl.contains("type Mutation"));
}

#[test(tokio::test)]
async fn test_attached_fields_resolve_against_parent() {
    let response = execute(&blog(), r#"{ user(id: "1") { fullName posts { title } } }"#).await;
    assert_eq!(
        response_json(response).unwrap(),
        json!({
            "user": {
                "fullName": "Ada Lovelace",
                "posts": [
                    { "title": "Notes on the Analytical Engine" },
                    { "title": "Sketch of the Engine" },
                ]
            }
        })
    );
}

#[test(tokio::test)]
async fn test_enum_values_round_trip() {
    let response = execute(&blog(), "{ users { id role } }").await;
    assert_eq!(
        response_json(response).unwrap(),
        json!({ "users": [{ "id": "1", "role": "ADMIN" }, { "id": "2", "role": "MEMBER" }] })
    );
}

#[test]
fn test_weaving_twice_gives_same_schema() {
    let store = MockUserStore::seeded();
    let containers = [user_queries(store.clone()), user_fields()];
    let first = weave(containers.clone()).unwrap().sdl();
    let second = weave(containers).unwrap().sdl();
    assert_eq!(first, second);
}

#[test]
fn test_same_container_added_twice() {
    let fields = user_fields();
    let sdl = weave([user_queries(MockUserStore::new()), fields.clone(), fields])
        .unwrap()
        .sdl();
    assert_eq!(sdl.matches("fullName").count(), 1);
}

#[test]
fn test_field_conflict_between_containers() {
    let other = resolver_of(user_silk())
        .operation(
            "fullName",
            field(Silk::new(ScalarType::string())).resolve(|_, _, _| async { Ok(Value::Null) }),
        )
        .build();
    let result = weave([user_queries(MockUserStore::new()), user_fields(), other]);
    assert_matches!(
        result,
        Err(WeaveError::FieldConflict { type_name, field }) if type_name == "User" && field == "fullName"
    );
}

#[test]
fn test_distinct_definitions_with_one_name() {
    let impostor = ObjectType::builder("Post").field("id", ScalarType::id()).build();
    let container = resolver()
        .operation(
            "featured",
            query(Silk::new(impostor)).resolve(|_, _| async { Ok(Value::Null) }),
        )
        .build();
    let result = weave([post_queries(), container]);
    assert_matches!(result, Err(WeaveError::DuplicateTypeName { name }) if name == "Post");
}

#[test]
fn test_hidden_fields_are_dropped() {
    let hide = resolver_of(user_silk()).hidden("email").build();
    let sdl = weave([user_queries(MockUserStore::new()), hide]).unwrap().sdl();
    assert!(sdl.contains("firstName"));
    assert!(!sdl.contains("email"));
}

#[test]
fn test_hidden_wins_over_attached() {
    let hide = resolver_of(user_silk()).hidden("fullName").build();
    let sdl = weave([user_queries(MockUserStore::new()), user_fields(), hide])
        .unwrap()
        .sdl();
    assert!(!sdl.contains("fullName"));
    assert!(sdl.contains("posts"));
}

#[test]
fn test_shortest_alias_wins() {
    init_tracing();
    let settings = ObjectType::anonymous().field("theme", ScalarType::string()).build();
    let owner = ObjectType::builder("Account").field("settings", settings.clone()).build();
    let container = resolver()
        .operation(
            "settingsForCurrentAccount",
            query(Silk::new(settings)).resolve(|_, _| async { Ok(Value::Null) }),
        )
        .operation(
            "account",
            query(Silk::new(owner)).resolve(|_, _| async { Ok(Value::Null) }),
        )
        .build();

    let sdl = weave([container]).unwrap().sdl();
    assert!(sdl.contains("type AccountSettings"));
    assert!(!sdl.contains("SettingsForCurrentAccount {"));
    assert!(sdl.contains("settingsForCurrentAccount: AccountSettings"));
}

#[test]
fn test_nested_alias_follows_renamed_parent() {
    let settings = ObjectType::anonymous().field("theme", ScalarType::string()).build();
    let details = ObjectType::anonymous().field("settings", settings).build();
    let container = resolver()
        .operation(
            "currentAccountDetails",
            query(Silk::new(details.clone())).resolve(|_, _| async { Ok(Value::Null) }),
        )
        .operation(
            "acct",
            query(Silk::new(details)).resolve(|_, _| async { Ok(Value::Null) }),
        )
        .build();

    let sdl = weave([container]).unwrap().sdl();
    assert!(sdl.contains("type Acct {"));
    assert!(sdl.contains("type AcctSettings {"));
    assert!(sdl.contains("settings: AcctSettings"));
    assert!(!sdl.contains("CurrentAccountDetails"));
}

#[test]
fn test_nested_alias_keeps_parent_name_as_written() {
    let settings = ObjectType::anonymous().field("retries", ScalarType::int()).build();
    let request = ObjectType::builder("HTTPRequest").field("settings", settings).build();
    let container = resolver()
        .operation(
            "lastRequest",
            query(Silk::new(request)).resolve(|_, _| async { Ok(Value::Null) }),
        )
        .build();

    let sdl = weave([container]).unwrap().sdl();
    assert!(sdl.contains("type HTTPRequestSettings {"));
    assert!(sdl.contains("settings: HTTPRequestSettings"));
}

#[test]
fn test_anonymous_enum_named_from_path() {
    let status = EnumType::anonymous(["DRAFT", "PUBLISHED"]);
    let container = resolver()
        .operation(
            "postStatus",
            query(Silk::new(status)).resolve(|_, _| async { Ok(Value::from("DRAFT")) }),
        )
        .build();
    let sdl = weave([container]).unwrap().sdl();
    assert!(sdl.contains("enum PostStatus"));
}

#[test]
fn test_unreached_anonymous_type_fails() {
    let loose = ObjectType::anonymous().field("x", ScalarType::int()).build();
    let result = SchemaLoom::new()
        .add(post_queries())
        .add_type(Silk::new(loose))
        .weave();
    assert_matches!(result, Err(WeaveError::UnnamedType(_)));
}

#[test]
fn test_input_derived_from_object() {
    let create = resolver()
        .operation(
            "createUser",
            mutation(user_silk())
                .args([("data", Silk::new(GraphQLType::non_null(USER.clone())))])
                .resolve(|input, _| async move {
                    match input {
                        Value::Object(mut fields) => {
                            Ok(fields.swap_remove("data").unwrap_or(Value::Null))
                        }
                        _ => Ok(Value::Null),
                    }
                }),
        )
        .build();

    let sdl = weave([post_queries(), create]).unwrap().sdl();
    assert!(sdl.contains("input UserInput"));
    assert!(sdl.contains("createUser(data: UserInput!): User"));
    assert!(sdl.contains("type Mutation"));
}

#[test(tokio::test)]
async fn test_mutation_with_derived_input_executes() {
    let create = resolver()
        .operation(
            "createPost",
            mutation(Silk::new(POST.clone()))
                .args([("post", Silk::new(POST.clone()))])
                .resolve(|input, _| async move {
                    match input {
                        Value::Object(mut fields) => {
                            Ok(fields.swap_remove("post").unwrap_or(Value::Null))
                        }
                        _ => Ok(Value::Null),
                    }
                }),
        )
        .build();

    let schema = weave([post_queries(), create]).unwrap();
    let response = execute(
        &schema,
        r#"mutation { createPost(post: { id: "99", title: "Hello", authorId: "1" }) { id title } }"#,
    )
    .await;
    assert_eq!(
        response_json(response).unwrap(),
        json!({ "createPost": { "id": "99", "title": "Hello" } })
    );
}

#[test]
fn test_custom_input_naming() {
    let create = resolver()
        .operation(
            "createUser",
            mutation(user_silk())
                .args([("data", user_silk())])
                .resolve(|_, _| async { Ok(Value::Null) }),
        )
        .build();

    let sdl = SchemaLoom::new()
        .config(
            CORE_SCHEMA_CONFIG,
            CoreSchemaConfig::default().input_object_name(|name| format!("{name}Data")),
        )
        .add(post_queries())
        .add(create)
        .weave()
        .unwrap()
        .sdl();
    assert!(sdl.contains("input UserData"));
}

#[test]
fn test_single_input_expands_to_arguments() {
    let filter = InputObjectType::builder("PostFilter")
        .field("titleContains", ScalarType::string())
        .field("limit", ScalarType::int())
        .build();
    let search = resolver()
        .operation(
            "searchPosts",
            query(Silk::new(GraphQLType::list(POST.clone())))
                .input(Silk::new(filter))
                .resolve(|_, _| async { Ok(Value::List(Vec::new())) }),
        )
        .build();

    let sdl = weave([search]).unwrap().sdl();
    assert!(sdl.contains("searchPosts(titleContains: String, limit: Int): [Post]"));
}

#[test]
fn test_union_argument_is_a_shape_error() {
    let result_type = UnionType::new("SearchResult", [POST.clone(), USER.clone()]);
    let filter = ObjectType::anonymous().field("kind", result_type).build();
    let search = resolver()
        .operation(
            "search",
            query(Silk::new(ScalarType::string()))
                .args([("filter", Silk::new(filter))])
                .resolve(|_, _| async { Ok(Value::Null) }),
        )
        .build();

    let error = weave([search]).err();
    assert_matches!(
        &error,
        Some(WeaveError::ShapeConversion { location, .. }) if location == &["search", "filter", "kind"]
    );
    assert!(error.is_some_and(|e| e.to_string().starts_with("[search.filter.kind] ")));
}

#[test(tokio::test)]
async fn test_union_resolves_by_typename() {
    let book = ObjectType::builder("Book").field("title", ScalarType::string()).build();
    let author = ObjectType::builder("Author").field("name", ScalarType::string()).build();
    let result_type = UnionType::new("SearchResult", [book, author]);
    let search = resolver()
        .operation(
            "search",
            query(Silk::new(GraphQLType::list(result_type))).resolve(|_, _| async {
                Ok(common::json(json!([
                    { "__typename": "Book", "title": "Dune" },
                    { "__typename": "Author", "name": "Herbert" },
                ])))
            }),
        )
        .build();

    let schema = weave([search]).unwrap();
    let response = execute(
        &schema,
        "{ search { __typename ... on Book { title } ... on Author { name } } }",
    )
    .await;
    assert_eq!(
        response_json(response).unwrap(),
        json!({
            "search": [
                { "__typename": "Book", "title": "Dune" },
                { "__typename": "Author", "name": "Herbert" },
            ]
        })
    );
}

#[test(tokio::test)]
async fn test_interface_resolve_type_hook() {
    let node = InterfaceType::builder("Node")
        .field("id", GraphQLType::non_null(ScalarType::id()))
        .resolve_type(|value| {
            let concrete = if string_of(value, "url").is_some() { "Photo" } else { "Article" };
            Some(ObjectType::empty(concrete))
        })
        .build();
    let photo = ObjectType::builder("Photo")
        .field("id", GraphQLType::non_null(ScalarType::id()))
        .field("url", ScalarType::string())
        .implements(node.clone())
        .build();
    let article = ObjectType::builder("Article")
        .field("id", GraphQLType::non_null(ScalarType::id()))
        .field("headline", ScalarType::string())
        .implements(node.clone())
        .build();

    let nodes = resolver()
        .operation(
            "nodes",
            query(Silk::new(GraphQLType::list(node))).resolve(|_, _| async {
                Ok(common::json(json!([
                    { "id": "1", "url": "a.png" },
                    { "id": "2", "headline": "News" },
                ])))
            }),
        )
        .build();

    let schema = SchemaLoom::new()
        .add(nodes)
        .add_type(Silk::new(photo))
        .add_type(Silk::new(article))
        .weave()
        .unwrap();
    assert!(schema.sdl().contains("type Photo implements Node"));

    let response = execute(
        &schema,
        "{ nodes { id ... on Photo { url } ... on Article { headline } } }",
    )
    .await;
    assert_eq!(
        response_json(response).unwrap(),
        json!({ "nodes": [{ "id": "1", "url": "a.png" }, { "id": "2", "headline": "News" }] })
    );
}

#[test]
fn test_object_used_as_interface() {
    let named = ObjectType::builder("Named").field("name", ScalarType::string()).build();
    let pet = ObjectType::builder("Pet")
        .field("name", ScalarType::string())
        .implements(named)
        .build();
    let pets = resolver()
        .operation(
            "pet",
            query(Silk::new(pet)).resolve(|_, _| async { Ok(Value::Null) }),
        )
        .build();

    let sdl = weave([pets]).unwrap().sdl();
    assert!(sdl.contains("interface Named"));
    assert!(sdl.contains("type Pet implements Named"));
}

#[test]
fn test_custom_scalars_are_emitted_once() {
    let date = ScalarType::with_description("Date", "Calendar date");
    let events = resolver()
        .operation(
            "today",
            query(Silk::new(date.clone())).resolve(|_, _| async { Ok(Value::from("2024-01-01")) }),
        )
        .operation(
            "tomorrow",
            query(Silk::new(date)).resolve(|_, _| async { Ok(Value::from("2024-01-02")) }),
        )
        .build();

    let sdl = weave([events]).unwrap().sdl();
    assert_eq!(sdl.matches("scalar Date").count(), 1);
}

#[test]
fn test_deprecation_and_descriptions() {
    let legacy = resolver()
        .operation(
            "oldPosts",
            query(Silk::new(GraphQLType::list(POST.clone())))
                .description("Posts from the old blog")
                .deprecated("use posts")
                .resolve(|_, _| async { Ok(Value::Null) }),
        )
        .build();

    let sdl = weave([legacy]).unwrap().sdl();
    assert!(sdl.contains("Posts from the old blog"));
    assert!(sdl.contains("@deprecated(reason: \"use posts\")"));
}
