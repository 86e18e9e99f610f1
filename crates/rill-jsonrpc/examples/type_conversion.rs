//! Extending the value codec with a user-defined record type.
//!
//! Implementing `ToJson`/`FromJson` for a type lets it travel through
//! registered methods like the built-ins: as a parameter, decoded from the
//! positional params array, and as a return value, encoded into the result.

use rill_jsonrpc::{FromJson, MethodRegistry, Request, RpcError, ToJson};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct User {
    name: String,
    age: i64,
}

impl ToJson for User {
    fn to_json(&self) -> Value {
        json!({"name": self.name, "age": self.age})
    }
}

impl FromJson for User {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("expected a user object"))?;
        let field = |name: &str| {
            obj.get(name).ok_or_else(|| {
                RpcError::invalid_params(format!("user is missing field '{name}'"))
            })
        };
        Ok(User {
            name: String::from_json(field("name")?)?,
            age: i64::from_json(field("age")?)?,
        })
    }
}

fn main() {
    let user = User {
        name: "Alice".to_string(),
        age: 28,
    };
    println!("serialized: {}", user.to_json());

    let parsed = User::from_json(&user.to_json()).expect("round trip");
    println!("deserialized: {}, age = {}", parsed.name, parsed.age);

    // The same conversions drive registered methods.
    let registry = MethodRegistry::new();
    registry.register("birthday", |mut user: User| -> User {
        user.age += 1;
        user
    });

    let request = Request::new("birthday", json!([user.to_json()]), 1);
    let response = registry.invoke(&request);
    println!("birthday result: {}", response.result().expect("success"));

    // Shape mismatches fail with InvalidParams, like the built-in types.
    let bad = Request::new("birthday", json!([{"name": "Bob"}]), 2);
    let response = registry.invoke(&bad);
    println!(
        "missing field: [{}] {}",
        response.error().expect("error").code,
        response.error().expect("error").message
    );
}
