//! One round trip carrying several requests and a notification.

use rill_jsonrpc_client::{Client, Request};
use serde_json::json;

fn main() {
    let client = Client::new("127.0.0.1", 8080);

    let requests = vec![
        Request::new("add", json!([10, 20]), 1),
        Request::new("multiply", json!([5, 6]), 2),
        // A notification: executed by the server, no response comes back.
        Request::notification("log", json!(["batch in flight"])),
        Request::new("subtract", json!([100, 58]), 3),
    ];

    let responses = client.call_batch(&requests).expect("batch failed");
    println!("{} responses (the notification has none):", responses.len());
    for response in &responses {
        println!(
            "  id {} -> {}",
            response.id(),
            response
                .result()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "error".to_string())
        );
    }
}
