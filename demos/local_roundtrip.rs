//! # Example: local_roundtrip
//!
//! Drives a full connection lifecycle against the in-process [`LocalTransport`]:
//! connect, receive and decode a message, publish, lose the connection,
//! reconnect into a second epoch, shut down.
//!
//! ## Flow
//! ```text
//! Supervisor::run()
//!     ├─► connect_now()            ──► EpochStarted{1}, workers up
//!     ├─► deliver(/topic/chat)     ──► SubscriptionSuccess{chat}
//!     ├─► emit(send.publish(..))   ──► transport.publish(/app/send)
//!     ├─► drop_connection()        ──► EpochEnded{1}
//!     ├─► (5 s later) reconnect    ──► EpochStarted{2}
//!     └─► shutdown()               ──► ShutdownComplete
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example local_roundtrip --features logging
//! ```

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use stompvisor::{
    ApiDefinition, CloseFrame, ConnectionConfig, EventKind, Frame, LocalTransport, LogWriter,
    PublishSpec, Routine, Subscribe, SubscriptionSpec, Supervisor,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct Chat {
    from: String,
    text: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let chat = Routine::new("chat");
    let send = Routine::new("send");
    let api = ApiDefinition::new()
        .subscribe(SubscriptionSpec::json::<Chat>("/topic/chat", chat.clone()))
        .publish(PublishSpec::new("/app/send", send.clone()));

    let broker = LocalTransport::default();
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(
        ConnectionConfig::new("ws://localhost:8080/ws").verbose(),
        api,
    )
    .with_subscribers(subs)
    .build(broker.factory())?;

    let mut events = sup.bus().subscribe();
    let run = tokio::spawn({
        let sup = sup.clone();
        async move { sup.run().await }
    });

    // 1. Broker accepts the connection.
    while !broker.connect_now() {
        tokio::task::yield_now().await;
    }
    while broker.subscriber_count("/topic/chat") == 0 {
        tokio::task::yield_now().await;
    }

    // 2. Inbound message, decoded by the subscription worker.
    broker.deliver(
        "/topic/chat",
        Frame::message(r#"{"from":"alice","text":"hi"}"#),
    );
    loop {
        let ev = events.recv().await?;
        if chat.is_success(&ev) {
            if let Some(msg) = ev.message::<Chat>() {
                println!("[chat] {} says {:?}", msg.body.from, msg.body.text);
            }
            break;
        }
    }

    // 3. Outbound message through the publish worker.
    sup.emit(send.publish(&json!({ "text": "hello back" }))?);
    while broker.published().is_empty() {
        tokio::task::yield_now().await;
    }
    for p in broker.published() {
        println!("[broker] {} <- {}", p.channel, p.body);
    }

    // 4. Connection lost; the transport reconnects after its fixed delay.
    broker.drop_connection(CloseFrame::new(1006, "network unreachable"));
    println!("[demo] waiting for reconnect...");
    loop {
        let ev = events.recv().await?;
        if ev.kind == EventKind::EpochStarted && ev.epoch == Some(2) {
            break;
        }
    }
    println!("[demo] alive: {:?}", sup.alive_workers().await);

    // 5. Graceful shutdown.
    sup.shutdown();
    run.await??;
    println!("[demo] broker active after shutdown: {}", broker.is_active());
    Ok(())
}
