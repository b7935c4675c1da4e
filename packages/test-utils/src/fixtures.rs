//! Type fixtures of a small blog domain

use async_graphql::Value;
use loom_core::{EnumType, GraphQLType, Issue, ObjectType, ScalarType, Silk};
use once_cell::sync::Lazy;

/// Account role
pub static ROLE: Lazy<EnumType> = Lazy::new(|| {
    EnumType::new("Role", ["ADMIN", "MEMBER"])
        .describe("What an account may do", [("ADMIN", "Full access")])
});

/// A registered account
pub static USER: Lazy<ObjectType> = Lazy::new(|| {
    ObjectType::builder("User")
        .description("A registered account")
        .field("id", GraphQLType::non_null(ScalarType::id()))
        .field("firstName", GraphQLType::non_null(ScalarType::string()))
        .field("lastName", GraphQLType::non_null(ScalarType::string()))
        .field("email", ScalarType::string())
        .field("role", ROLE.clone())
        .build()
});

/// A blog post written by a [`USER`]
pub static POST: Lazy<ObjectType> = Lazy::new(|| {
    ObjectType::builder("Post")
        .field("id", GraphQLType::non_null(ScalarType::id()))
        .field("title", GraphQLType::non_null(ScalarType::string()))
        .field("authorId", GraphQLType::non_null(ScalarType::id()))
        .build()
});

pub fn user_silk() -> Silk {
    Silk::new(USER.clone())
}

pub fn post_silk() -> Silk {
    Silk::new(POST.clone())
}

/// `Int` accepting only values above zero
pub fn positive_int() -> Silk {
    Silk::new(ScalarType::int()).with_sync_validator(|value| match &value {
        Value::Number(number) if number.as_i64().is_some_and(|n| n > 0) => Ok(value),
        _ => Err(vec![Issue::new("must be a positive integer")]),
    })
}

/// `String` holding an email address, lowercased on the way in
pub fn email() -> Silk {
    Silk::new(ScalarType::string()).with_sync_validator(|value| match value {
        Value::String(address) if address.contains('@') => {
            Ok(Value::String(address.to_lowercase()))
        }
        _ => Err(vec![Issue::new("must be an email address")]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_are_shared_definitions() {
        assert_eq!(USER.key(), USER.clone().key());
        assert!(USER.fields().contains_key("role"));
    }

    #[tokio::test]
    async fn test_positive_int() {
        assert!(positive_int().parse(Value::from(3)).await.is_ok());
        assert!(positive_int().parse(Value::from(0)).await.is_err());
    }

    #[tokio::test]
    async fn test_email_is_lowercased() {
        let parsed = email().parse(Value::from("Ada@Example.COM")).await;
        assert_eq!(parsed, Ok(Value::from("ada@example.com")));
    }
}
