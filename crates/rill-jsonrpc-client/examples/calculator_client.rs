//! Synchronous calls against the calculator server example.

use rill_jsonrpc_client::Client;

fn main() {
    let client = Client::new("127.0.0.1", 8080);

    let sum: i64 = client.call("add", (10i64, 20i64)).expect("add failed");
    println!("add(10, 20) = {sum}");

    let difference: i64 = client
        .call("subtract", (50i64, 8i64))
        .expect("subtract failed");
    println!("subtract(50, 8) = {difference}");

    let quotient: f64 = client.call("divide", (1.0f64, 4.0f64)).expect("divide failed");
    println!("divide(1, 4) = {quotient}");

    // Fire-and-forget: returns immediately, no response is read.
    client.notify("log", ("calculator client finished",));
}
