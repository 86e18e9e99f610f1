//! Asynchronous calls with callback delivery.
//!
//! Callbacks fire while `run()` pumps the client's reactor.

use rill_jsonrpc_client::Client;

fn main() {
    let client = Client::new("127.0.0.1", 8080);

    for i in 0..5i64 {
        client.async_call("multiply", (i, i), move |response| match response.result() {
            Some(value) => println!("multiply({i}, {i}) = {value}"),
            None => eprintln!(
                "multiply({i}, {i}) failed: {}",
                response.error().map(|e| e.message.as_str()).unwrap_or("?")
            ),
        });
    }

    let processed = client.run();
    println!("processed {processed} async completions");
}
