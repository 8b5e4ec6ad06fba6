//! Example: Fake Request Demo
//!
//! Demonstrates: Driving a fake cross-domain request through its lifecycle
//!
//! Run with: `cargo run --example fake_request_demo`

use jugar_fingir::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

fn main() -> FingirResult<()> {
    println!("=== Fake Request Example ===\n");

    // 1. Construct a request and wire up its event handlers
    println!("1. Constructing a request with event handlers...");
    let mut request = FakeXDomainRequest::new();
    let events = Rc::new(RefCell::new(Vec::new()));
    let progress = Rc::clone(&events);
    let load = Rc::clone(&events);
    let error = Rc::clone(&events);
    let timeout = Rc::clone(&events);
    request.on_progress(move || progress.borrow_mut().push("onprogress"));
    request.on_load(move || load.borrow_mut().push("onload"));
    request.on_error(move || error.borrow_mut().push("onerror"));
    request.on_timeout(move || timeout.borrow_mut().push("ontimeout"));
    println!("   Ready state: {:?}", request.ready_state());

    // 2. Open and send
    println!("\n2. Opening and sending...");
    request.open("POST", "/api/orders");
    request.send(Some("item=libro&qty=1"))?;
    println!(
        "   Method: {:?}, URL: {:?}",
        request.method(),
        request.url()
    );
    println!(
        "   Content-Type stamped: {:?}",
        request.request_headers().get("Content-Type")
    );

    // 3. Respond with a chunked body
    println!("\n3. Responding with a chunked body...");
    request.set_chunk_size(8);
    request.respond(Some(201), None, "order accepted: number 4412")?;
    println!("   Status: {}", request.status());
    println!("   Response text: {:?}", request.response_text());
    println!("   Events fired: {:?}", events.borrow());

    // 4. Simulate a timeout on the next cycle
    println!("\n4. Simulating a timeout on the next cycle...");
    request.open("GET", "/api/orders/4412");
    request.send(None)?;
    request.simulate_timeout();
    println!(
        "   Status: {}, timed out: {}",
        request.status(),
        request.timed_out()
    );

    // 5. Install the fake for a scope and capture dispatched requests
    println!("\n5. Installing the fake for a scope...");
    let guard = use_fake_xdomain_request();
    let captured: Rc<RefCell<Vec<RequestSnapshot>>> = Rc::new(RefCell::new(Vec::new()));
    let captured_in_hook = Rc::clone(&captured);
    set_on_create(move |created| {
        let captured_in_send = Rc::clone(&captured_in_hook);
        created.on_send(move |dispatched| {
            captured_in_send.borrow_mut().push(dispatched.snapshot());
        });
    });

    let mut client = guard.constructor().build();
    client.open("GET", "/api/inventory");
    client.send(None)?;
    println!(
        "   Captured {} request(s), first URL: {:?}",
        captured.borrow().len(),
        captured.borrow()[0].url
    );

    client.respond(Some(200), None, "7 items")?;
    println!("   Harness answered: {:?}", client.response_text());
    guard.restore(false);

    println!("\n✅ Fake request example completed successfully!");
    Ok(())
}
