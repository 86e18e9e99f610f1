//! What the different failure modes look like from the caller's side.

use std::time::Duration;

use rill_jsonrpc_client::{Client, ErrorCode};

fn main() {
    let mut client = Client::new("127.0.0.1", 8080);
    client.set_timeout(Duration::from_millis(1500));

    // Unknown method: the server answers with MethodNotFound.
    match client.call::<i64, _>("no_such_method", ()) {
        Ok(_) => unreachable!(),
        Err(err) => println!("unknown method -> [{}] {}", err.code, err.message),
    }

    // Wrong argument types: InvalidParams, raised by the server-side codec.
    match client.call::<i64, _>("add", ("one", "two")) {
        Ok(_) => unreachable!(),
        Err(err) => {
            assert_eq!(err.kind(), ErrorCode::InvalidParams);
            println!("bad params -> [{}] {}", err.code, err.message);
        }
    }

    // Application failure: the divide procedure returns a server error.
    match client.call::<f64, _>("divide", (1.0f64, 0.0f64)) {
        Ok(_) => unreachable!(),
        Err(err) => println!("division by zero -> [{}] {}", err.code, err.message),
    }

    // Transport failure: a timeout shows up as InternalError with a
    // network-level cause in the message.
    match client.call::<i64, _>("delay", (5000i64,)) {
        Ok(_) => unreachable!(),
        Err(err) => println!("timeout -> [{}] {}", err.code, err.message),
    }
}
